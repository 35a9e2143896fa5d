use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::db::Store;
use crate::error::Result;
use crate::library::{filter_records, ViewMode};
use crate::models::SummaryRecord;
use crate::overlay::{OverlayController, OverlaySettings, SummarizeCall};
use crate::protocol::{Response, SummarizeRequest};
use crate::router::RouterHandle;
use crate::services::{Link, Page, PageFetcher};
use crate::tui::{AppAction, InputMode};

// Messages from background tasks
enum TaskResult {
    Overlay {
        url: String,
        force_reload: bool,
        response: Response,
    },
    Resummarized(Response),
    PageLoaded(std::result::Result<Page, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Library,
    Browse,
}

pub struct App {
    // Data
    pub records: Vec<SummaryRecord>,
    pub page: Option<Page>,

    // UI State
    pub view: View,
    pub view_mode: ViewMode,
    pub selected_index: usize,
    pub search_query: String,
    pub search_active: bool,
    pub confirm_clear: bool,
    pub show_help: bool,
    pub link_index: usize,
    pub tooltip_focused: bool,
    pub status: Option<String>,
    pub overlay: OverlayController,

    // Async state
    pub is_loading_page: bool,
    pub is_resummarizing: bool,
    results_rx: mpsc::Receiver<TaskResult>,
    results_tx: mpsc::Sender<TaskResult>,

    // Services
    store: Arc<Store>,
    router: RouterHandle,
    fetcher: Arc<PageFetcher>,
}

impl App {
    pub async fn new(
        store: Arc<Store>,
        router: RouterHandle,
        fetcher: Arc<PageFetcher>,
        overlay: OverlaySettings,
    ) -> Result<Self> {
        let records = store.get_all().await?;
        let (results_tx, results_rx) = mpsc::channel(16);

        Ok(Self {
            records,
            page: None,
            view: View::Library,
            view_mode: ViewMode::default(),
            selected_index: 0,
            search_query: String::new(),
            search_active: false,
            confirm_clear: false,
            show_help: false,
            link_index: 0,
            tooltip_focused: false,
            status: None,
            overlay: OverlayController::new(overlay),
            is_loading_page: false,
            is_resummarizing: false,
            results_rx,
            results_tx,
            store,
            router,
            fetcher,
        })
    }

    pub fn input_mode(&self) -> InputMode {
        if self.show_help {
            InputMode::Help
        } else if self.confirm_clear {
            InputMode::ConfirmClear
        } else if self.search_active {
            InputMode::Search
        } else if self.view == View::Browse {
            InputMode::Browse
        } else {
            InputMode::Library
        }
    }

    pub fn trigger_key(&self) -> char {
        self.overlay.trigger_key()
    }

    /// Records matching the current search, in display order.
    pub fn visible_records(&self) -> Vec<&SummaryRecord> {
        filter_records(&self.records, &self.search_query)
    }

    pub fn selected_record(&self) -> Option<&SummaryRecord> {
        self.visible_records().get(self.selected_index).copied()
    }

    pub fn hovered_link(&self) -> Option<&Link> {
        self.page.as_ref()?.links.get(self.link_index)
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::MoveUp => {
                self.selected_index = self.selected_index.saturating_sub(1);
            }

            AppAction::MoveDown => {
                let len = self.visible_records().len();
                if len > 0 && self.selected_index < len - 1 {
                    self.selected_index += 1;
                }
            }

            AppAction::MoveToTop => {
                self.selected_index = 0;
            }

            AppAction::MoveToBottom => {
                self.selected_index = self.visible_records().len().saturating_sub(1);
            }

            AppAction::DeleteSelected => {
                if let Some(record) = self.selected_record() {
                    let id = record.id;
                    match self.store.delete_by_id(id).await {
                        Ok(()) => self.status = Some("Summary deleted".to_string()),
                        Err(e) => {
                            tracing::error!("Error deleting summary: {}", e);
                            self.status = Some(format!("Delete failed: {e}"));
                        }
                    }
                    self.reload_records().await;
                }
            }

            AppAction::ClearAllStart => {
                if !self.records.is_empty() {
                    self.confirm_clear = true;
                }
            }

            AppAction::ClearAllConfirm => {
                self.confirm_clear = false;
                match self.store.clear().await {
                    Ok(()) => self.status = Some("All summaries cleared".to_string()),
                    Err(e) => {
                        tracing::error!("Error clearing summaries: {}", e);
                        self.status = Some(format!("Clear failed: {e}"));
                    }
                }
                self.reload_records().await;
            }

            AppAction::ClearAllCancel => {
                self.confirm_clear = false;
            }

            AppAction::ToggleViewMode => {
                self.view_mode = self.view_mode.toggle();
            }

            AppAction::Resummarize => self.resummarize_active_page(),

            AppAction::OpenSelected => {
                if let Some(record) = self.selected_record() {
                    let url = record.url.clone();
                    let _ = open::that(&url);
                }
            }

            AppAction::OpenBrowse => {
                if self.page.is_some() {
                    self.enter_browse();
                } else if self.is_loading_page {
                    self.status = Some("Page is still loading...".to_string());
                } else {
                    self.status = Some("No active page. Start with a URL to browse.".to_string());
                }
            }

            AppAction::ShowHelp => {
                self.show_help = true;
            }

            AppAction::HideHelp => {
                self.show_help = false;
            }

            AppAction::SearchStart => {
                self.search_active = true;
            }

            AppAction::SearchChar(c) => {
                self.search_query.push(c);
                self.selected_index = 0;
            }

            AppAction::SearchBackspace => {
                self.search_query.pop();
                self.selected_index = 0;
            }

            AppAction::SearchConfirm => {
                self.search_active = false;
            }

            AppAction::SearchCancel => {
                self.search_active = false;
                self.search_query.clear();
                self.selected_index = 0;
            }

            AppAction::LinkUp => {
                if self.link_index > 0 {
                    self.move_hover(self.link_index - 1);
                }
            }

            AppAction::LinkDown => {
                let len = self.page.as_ref().map_or(0, |p| p.links.len());
                if self.link_index + 1 < len {
                    self.move_hover(self.link_index + 1);
                }
            }

            AppAction::TriggerKey(c) => {
                if let Some(call) = self.overlay.key_pressed(c, &self.router) {
                    self.dispatch(call);
                }
            }

            AppAction::ToggleTooltipFocus => self.toggle_tooltip_focus(),

            AppAction::ReloadTooltip => {
                if let Some(call) = self.overlay.reload(&self.router) {
                    self.dispatch(call);
                }
            }

            AppAction::OpenLink => {
                if let Some(link) = self.hovered_link() {
                    let url = link.url.clone();
                    let _ = open::that(&url);
                }
            }

            AppAction::BackToLibrary => {
                if let Some(url) = self.hovered_link().map(|l| l.url.clone()) {
                    self.overlay.link_left(&url, Instant::now());
                }
                if self.tooltip_focused {
                    self.overlay.tooltip_left(Instant::now());
                    self.tooltip_focused = false;
                }
                self.view = View::Library;
            }
        }

        Ok(false)
    }

    /// Advance overlay timers. Called once per render loop.
    pub fn tick(&mut self) {
        self.overlay.tick(Instant::now());
        if self.overlay.tooltip().is_none() {
            self.tooltip_focused = false;
        }
    }

    /// Start loading `url` as the active page.
    pub fn load_page(&mut self, url: String) {
        self.is_loading_page = true;
        self.status = Some(format!("Loading {url}..."));

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&url).await.map_err(|e| e.to_string());
            let _ = tx.send(TaskResult::PageLoaded(result)).await;
        });
    }

    /// Poll for completed background work (non-blocking)
    pub async fn poll_results(&mut self) -> Result<()> {
        while let Ok(result) = self.results_rx.try_recv() {
            match result {
                TaskResult::Overlay {
                    url,
                    force_reload,
                    response,
                } => {
                    if force_reload {
                        self.overlay.reload_finished(&url, response);
                    } else {
                        self.overlay.summary_received(&url, response, Instant::now());
                    }
                    self.reload_records().await;
                }

                TaskResult::Resummarized(response) => {
                    self.is_resummarizing = false;
                    self.status = Some(match response {
                        Response::Summary { .. } => "Active page summarized".to_string(),
                        Response::Error { error } => {
                            tracing::error!("Error reloading summary: {}", error);
                            format!("Re-summarize failed: {error}")
                        }
                    });
                    self.reload_records().await;
                }

                TaskResult::PageLoaded(Ok(page)) => {
                    self.is_loading_page = false;
                    self.status = Some(format!("{} links on {}", page.links.len(), page.title));
                    self.page = Some(page);
                    self.link_index = 0;
                    self.enter_browse();
                }

                TaskResult::PageLoaded(Err(e)) => {
                    self.is_loading_page = false;
                    tracing::error!("Failed to load page: {}", e);
                    self.status = Some(format!("Failed to load page: {e}"));
                }
            }
        }
        Ok(())
    }

    async fn reload_records(&mut self) {
        match self.store.get_all().await {
            Ok(records) => {
                self.records = records;
                let len = self.visible_records().len();
                if self.selected_index >= len {
                    self.selected_index = len.saturating_sub(1);
                }
            }
            Err(e) => {
                tracing::error!("Error fetching summaries: {}", e);
                self.status = Some(format!("Could not load summaries: {e}"));
            }
        }
    }

    fn enter_browse(&mut self) {
        self.view = View::Browse;
        if let Some(link) = self.hovered_link().cloned() {
            self.overlay.link_entered(link, Instant::now());
        }
    }

    fn move_hover(&mut self, index: usize) {
        let now = Instant::now();
        if self.tooltip_focused {
            self.overlay.tooltip_left(now);
            self.tooltip_focused = false;
        }
        if let Some(url) = self.hovered_link().map(|l| l.url.clone()) {
            self.overlay.link_left(&url, now);
        }
        self.link_index = index;
        if let Some(link) = self.hovered_link().cloned() {
            self.overlay.link_entered(link, now);
        }
    }

    /// Moving focus into the tooltip leaves the link, and moving it back
    /// re-hovers the link.
    fn toggle_tooltip_focus(&mut self) {
        if self.overlay.tooltip().is_none() {
            return;
        }
        let now = Instant::now();
        let hovered = self.hovered_link().cloned();

        if self.tooltip_focused {
            self.overlay.tooltip_left(now);
            if let Some(link) = hovered {
                self.overlay.link_entered(link, now);
            }
        } else {
            if let Some(link) = hovered {
                self.overlay.link_left(&link.url, now);
            }
            self.overlay.tooltip_entered();
        }
        self.tooltip_focused = !self.tooltip_focused;
    }

    fn dispatch(&self, call: SummarizeCall) {
        let router = self.router.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            let SummarizeCall { link, force_reload } = call;
            let text = fetcher.text_for(&link.url).await;
            let request = SummarizeRequest {
                text,
                url: link.url.clone(),
                title: link.title,
                force_reload,
            };

            let response = router.summarize(request).await.unwrap_or_else(|e| {
                tracing::error!("Error sending message: {}", e);
                Response::error(e.to_string())
            });

            let _ = tx
                .send(TaskResult::Overlay {
                    url: link.url,
                    force_reload,
                    response,
                })
                .await;
        });
    }

    fn resummarize_active_page(&mut self) {
        let Some(page) = &self.page else {
            self.status = Some("No active page to summarize".to_string());
            return;
        };
        if self.is_resummarizing {
            return;
        }

        let request = SummarizeRequest {
            text: page.text.clone(),
            url: page.url.clone(),
            title: page.title.clone(),
            force_reload: true,
        };
        self.is_resummarizing = true;
        self.status = Some(format!("Summarizing {}...", page.title));

        let router = self.router.clone();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let response = router
                .summarize(request)
                .await
                .unwrap_or_else(|e| Response::error(e.to_string()));
            let _ = tx.send(TaskResult::Resummarized(response)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Summarizer, SummarizerConfig};
    use crate::models::NewRecord;
    use crate::router::Router;

    async fn app_with(records: &[(&str, &str)]) -> App {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        for (url, title) in records {
            store
                .add(NewRecord {
                    url: url.to_string(),
                    title: title.to_string(),
                    summary: format!("summary of {title}"),
                })
                .await
                .unwrap();
        }
        let summarizer = Arc::new(
            Summarizer::new(SummarizerConfig {
                api_url: "http://127.0.0.1:9/unused".to_string(),
                api_key: None,
                model: "m".to_string(),
                timeout: None,
            })
            .unwrap(),
        );
        let (router, _task) = Router::new(summarizer, Arc::clone(&store)).spawn();
        App::new(
            store,
            router,
            Arc::new(PageFetcher::new().unwrap()),
            OverlaySettings::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn search_narrows_visible_records() {
        let mut app = app_with(&[("http://a.example", "Foo"), ("http://b.example", "Bar")]).await;

        app.handle_action(AppAction::SearchStart).await.unwrap();
        for c in "FOO".chars() {
            app.handle_action(AppAction::SearchChar(c)).await.unwrap();
        }
        assert_eq!(app.input_mode(), InputMode::Search);
        let visible = app.visible_records();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Foo");

        app.handle_action(AppAction::SearchCancel).await.unwrap();
        assert_eq!(app.visible_records().len(), 2);
    }

    #[tokio::test]
    async fn delete_refetches_and_clamps_selection() {
        let mut app = app_with(&[("http://a.example", "A"), ("http://b.example", "B")]).await;
        app.handle_action(AppAction::MoveToBottom).await.unwrap();
        assert_eq!(app.selected_index, 1);

        app.handle_action(AppAction::DeleteSelected).await.unwrap();

        assert_eq!(app.records.len(), 1);
        assert_eq!(app.selected_index, 0);
    }

    #[tokio::test]
    async fn clear_all_requires_confirmation() {
        let mut app = app_with(&[("http://a.example", "A"), ("http://b.example", "B")]).await;

        app.handle_action(AppAction::ClearAllStart).await.unwrap();
        assert_eq!(app.input_mode(), InputMode::ConfirmClear);
        app.handle_action(AppAction::ClearAllCancel).await.unwrap();
        assert_eq!(app.records.len(), 2);

        app.handle_action(AppAction::ClearAllStart).await.unwrap();
        app.handle_action(AppAction::ClearAllConfirm).await.unwrap();
        assert!(app.records.is_empty());
        assert_eq!(app.input_mode(), InputMode::Library);
    }

    #[tokio::test]
    async fn resummarize_without_active_page_reports_status() {
        let mut app = app_with(&[]).await;
        app.handle_action(AppAction::Resummarize).await.unwrap();
        assert!(!app.is_resummarizing);
        assert_eq!(app.status.as_deref(), Some("No active page to summarize"));
    }
}
