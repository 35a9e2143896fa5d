use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::ai::Summarizer;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::NewRecord;
use crate::protocol::{Request, Response, SummarizeRequest};

/// Reply that will be delivered once the router finishes the request.
pub type PendingReply = oneshot::Receiver<Response>;

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Reports whether the component a caller depends on is still alive.
///
/// A page view created before the router was restarted holds a handle that
/// no longer reaches anything; callers check this before sending.
pub trait ContextProbe {
    fn is_valid(&self) -> bool;
}

#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl RouterHandle {
    /// Queue `request` and return the receiver its response will arrive on.
    pub fn request(&self, request: Request) -> Result<PendingReply> {
        let (reply, pending) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .map_err(|_| AppError::RouterClosed)?;
        Ok(pending)
    }

    pub async fn summarize(&self, request: SummarizeRequest) -> Result<Response> {
        let pending = self.request(Request::Summarize(request))?;
        pending.await.map_err(|_| AppError::RouterClosed)
    }
}

impl ContextProbe for RouterHandle {
    fn is_valid(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Receives summarize requests, runs them through the summarizer and
/// persists every outcome before replying.
pub struct Router {
    summarizer: Arc<Summarizer>,
    store: Arc<Store>,
}

impl Router {
    pub fn new(summarizer: Arc<Summarizer>, store: Arc<Store>) -> Self {
        Self { summarizer, store }
    }

    /// Start the router on the current runtime. The router stops once every
    /// handle has been dropped.
    pub fn spawn(self) -> (RouterHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Arc::new(self).run(rx));
        (RouterHandle { tx }, task)
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            let router = Arc::clone(&self);
            tokio::spawn(async move {
                let response = router.handle(envelope.request).await;
                if envelope.reply.send(response).is_err() {
                    tracing::debug!("Caller went away before the response was ready");
                }
            });
        }
        tracing::debug!("Router stopped");
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Summarize(req) => self.summarize_and_store(req).await,
        }
    }

    async fn summarize_and_store(&self, req: SummarizeRequest) -> Response {
        if req.force_reload {
            tracing::debug!("Forced reload requested for {}", req.url);
        }

        let summary = self.summarizer.summarize(&req.text, &req.url).await;

        let record = NewRecord {
            url: req.url,
            title: req.title,
            summary: summary.clone(),
        };

        match self.store.add(record).await {
            Ok(id) => {
                tracing::info!("Generated and stored summary {}", id);
                Response::Summary { summary }
            }
            Err(e) => {
                tracing::error!("Summarization error: {}", e);
                Response::error("Failed to summarize")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{SummarizerConfig, FALLBACK_SUMMARY};
    use crate::protocol::serve_lines;
    use chrono::Utc;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    fn summarizer_for(server: &MockServer) -> Arc<Summarizer> {
        Arc::new(
            Summarizer::new(SummarizerConfig {
                api_url: server.url("/chat/completions"),
                api_key: Some("secret".to_string()),
                model: "test-model".to_string(),
                timeout: Some(Duration::from_secs(5)),
            })
            .unwrap(),
        )
    }

    fn summarize(url: &str, title: &str) -> Request {
        Request::Summarize(SummarizeRequest {
            text: url.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            force_reload: false,
        })
    }

    async fn ok_server(summary: &str) -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": summary}}]
                }));
            })
            .await;
        server
    }

    #[tokio::test]
    async fn successful_call_persists_exactly_one_record() {
        let server = ok_server("Page about foo.").await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let router = Router::new(summarizer_for(&server), Arc::clone(&store));

        let before = Utc::now().timestamp_millis();
        let response = router.handle(summarize("http://a.example", "Foo")).await;

        assert_eq!(
            response,
            Response::Summary {
                summary: "Page about foo.".into()
            }
        );
        let records = store.get_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "Page about foo.");
        assert_eq!(records[0].title, "Foo");
        assert!(records[0].timestamp >= before);
    }

    #[tokio::test]
    async fn failed_call_still_persists_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401);
            })
            .await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let router = Router::new(summarizer_for(&server), Arc::clone(&store));

        let response = router.handle(summarize("http://a.example", "Foo")).await;

        assert_eq!(
            response,
            Response::Summary {
                summary: FALLBACK_SUMMARY.into()
            }
        );
        let records = store.get_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn persistence_failure_returns_error_marker() {
        let server = ok_server("irrelevant").await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        store.drop_table_for_tests().await;
        let router = Router::new(summarizer_for(&server), store);

        let response = router.handle(summarize("http://a.example", "Foo")).await;

        assert_eq!(response, Response::error("Failed to summarize"));
    }

    #[tokio::test]
    async fn concurrent_requests_are_not_deduplicated() {
        let server = ok_server("same").await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let (handle, _task) = Router::new(summarizer_for(&server), Arc::clone(&store)).spawn();

        let first = handle.request(summarize("http://a.example", "A")).unwrap();
        let second = handle.request(summarize("http://a.example", "A")).unwrap();
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first.unwrap(), Response::Summary { .. }));
        assert!(matches!(second.unwrap(), Response::Summary { .. }));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn burst_of_requests_is_never_rejected() {
        let server = ok_server("burst").await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let (handle, _task) = Router::new(summarizer_for(&server), Arc::clone(&store)).spawn();

        let pending: Vec<_> = (0..40)
            .map(|i| {
                handle
                    .request(summarize(&format!("http://a.example/{i}"), "A"))
                    .unwrap()
            })
            .collect();

        for reply in pending {
            assert_eq!(reply.await.unwrap(), Response::Summary { summary: "burst".into() });
        }
        assert_eq!(store.count().await.unwrap(), 40);
    }

    #[tokio::test]
    async fn reply_stays_pending_until_summary_is_ready() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .delay(Duration::from_millis(200))
                    .json_body(json!({
                        "choices": [{"message": {"role": "assistant", "content": "late"}}]
                    }));
            })
            .await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let (handle, _task) = Router::new(summarizer_for(&server), store).spawn();

        let reply = handle.request(summarize("http://a.example", "A")).unwrap();
        let mut pending = tokio_test::task::spawn(reply);
        assert_pending!(pending.poll());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(pending.is_woken());
        let response = assert_ready!(pending.poll()).unwrap();
        assert_eq!(response, Response::Summary { summary: "late".into() });
    }

    #[tokio::test]
    async fn handle_reports_invalid_once_router_is_gone() {
        let server = ok_server("x").await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let (handle, task) = Router::new(summarizer_for(&server), store).spawn();
        assert!(handle.is_valid());

        task.abort();
        let _ = task.await;

        assert!(!handle.is_valid());
        assert!(matches!(
            handle.request(summarize("http://a.example", "A")),
            Err(AppError::RouterClosed)
        ));
    }

    #[tokio::test]
    async fn stdio_bridge_answers_each_line() {
        let server = ok_server("bridged").await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let (handle, _task) = Router::new(summarizer_for(&server), Arc::clone(&store)).spawn();

        let input = concat!(
            r#"{"action":"summarize","text":"t","url":"http://a.example","title":"A"}"#,
            "\n",
            "not json\n",
        );
        let mut output = Vec::new();
        serve_lines(&handle, input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Response> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], Response::Summary { summary: "bridged".into() });
        assert!(matches!(lines[1], Response::Error { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stdio_bridge_runs_requests_concurrently_but_replies_in_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions").body_contains("alpha");
                then.status(200)
                    .delay(Duration::from_millis(400))
                    .json_body(json!({
                        "choices": [{"message": {"role": "assistant", "content": "slow"}}]
                    }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions").body_contains("beta");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "fast"}}]
                }));
            })
            .await;
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let (handle, _task) = Router::new(summarizer_for(&server), Arc::clone(&store)).spawn();

        let input = concat!(
            r#"{"action":"summarize","text":"alpha","url":"http://a.example","title":"A"}"#,
            "\n",
            r#"{"action":"summarize","text":"beta","url":"http://b.example","title":"B"}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve_lines(&handle, input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Response> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                Response::Summary { summary: "slow".into() },
                Response::Summary { summary: "fast".into() },
            ]
        );

        // The second request finished first, so the first one is the newest record
        let records = store.get_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "http://a.example");
        assert_eq!(records[1].url, "http://b.example");
    }
}
