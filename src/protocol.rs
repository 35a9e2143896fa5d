//! Request/response messages exchanged with the router, plus a JSON-lines
//! bridge so a browser-side script can talk to it over stdin/stdout.

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::router::RouterHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    Summarize(SummarizeRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub text: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub force_reload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Summary { summary: String },
    Error { error: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }
}

/// Serve requests read line by line from `input`, writing one JSON response
/// line per request to `output`.
///
/// Every line is dispatched as soon as it is read, so requests run
/// concurrently, but replies are written in request order. Ends once `input`
/// reaches EOF and every outstanding reply has been written.
pub async fn serve_lines<R, W>(handle: &RouterHandle, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut in_flight = FuturesOrdered::new();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => in_flight.push_back(dispatch(handle, &line)),
                None => input_open = false,
            },
            Some(response) = in_flight.next(), if !in_flight.is_empty() => {
                write_response(&mut output, &response).await?;
            }
            else => break,
        }
    }

    Ok(())
}

fn dispatch(handle: &RouterHandle, line: &str) -> BoxFuture<'static, Response> {
    let request = match serde_json::from_str::<Request>(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejecting malformed request: {}", e);
            return future::ready(Response::error(format!("invalid request: {e}"))).boxed();
        }
    };

    match handle.request(request) {
        Ok(pending) => pending
            .map(|reply| reply.unwrap_or_else(|_| Response::error("Failed to summarize")))
            .boxed(),
        Err(e) => future::ready(Response::error(e.to_string())).boxed(),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(output: &mut W, response: &Response) -> Result<()> {
    let mut encoded = serde_json::to_string(response)?;
    encoded.push('\n');
    output.write_all(encoded.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

pub async fn serve_stdio(handle: &RouterHandle) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve_lines(handle, stdin, tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summarize_request() {
        let request: Request = serde_json::from_str(
            r#"{"action":"summarize","text":"body","url":"http://a.example","title":"A","forceReload":true}"#,
        )
        .unwrap();

        assert_eq!(
            request,
            Request::Summarize(SummarizeRequest {
                text: "body".into(),
                url: "http://a.example".into(),
                title: "A".into(),
                force_reload: true,
            })
        );
    }

    #[test]
    fn force_reload_and_title_are_optional() {
        let Request::Summarize(req) =
            serde_json::from_str(r#"{"action":"summarize","text":"","url":"http://a.example"}"#)
                .unwrap();
        assert!(!req.force_reload);
        assert!(req.title.is_empty());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"action":"explode","url":"x"}"#).is_err());
    }

    #[test]
    fn responses_use_bare_shapes() {
        assert_eq!(
            serde_json::to_string(&Response::Summary { summary: "hi".into() }).unwrap(),
            r#"{"summary":"hi"}"#
        );
        assert_eq!(
            serde_json::to_string(&Response::error("Failed to summarize")).unwrap(),
            r#"{"error":"Failed to summarize"}"#
        );
        let parsed: Response = serde_json::from_str(r#"{"error":"x"}"#).unwrap();
        assert_eq!(parsed, Response::error("x"));
    }
}
