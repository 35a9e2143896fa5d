use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod library;
mod models;
mod overlay;
mod protocol;
mod router;
mod services;
mod tui;

use ai::{Summarizer, SummarizerConfig};
use app::App;
use config::Config;
use db::Store;
use error::Result;
use library::{filter_records, group_by_day};
use overlay::OverlaySettings;
use protocol::{Response, SummarizeRequest};
use router::{Router, RouterHandle};
use services::PageFetcher;
use tui::{draw, handle_key_event};

enum Command {
    Tui { page_url: Option<String> },
    Stdio,
    Summarize(String),
    List(String),
    History(String),
}

fn parse_args(args: &[String]) -> Command {
    match args.get(1).map(String::as_str) {
        Some("--stdio") => Command::Stdio,
        Some("--summarize") if args.len() >= 3 => Command::Summarize(args[2].clone()),
        Some("--history") if args.len() >= 3 => Command::History(args[2].clone()),
        Some("--list") => Command::List(args[2..].join(" ")),
        Some(url) if !url.starts_with("--") => Command::Tui {
            page_url: Some(url.to_string()),
        },
        _ => Command::Tui { page_url: None },
    }
}

/// `RUST_LOG` directives when set and valid, warnings and errors otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args);

    let config = Config::load()?;

    // Open the store once; everything that persists shares this handle
    let store = Arc::new(Store::open(&config.db_path).await?);

    // Listing commands only read the store
    match &command {
        Command::List(query) => return print_grouped(&store, query).await,
        Command::History(url) => return print_history(&store, url).await,
        _ => {}
    }

    if config.api_key.is_none() {
        tracing::warn!(
            "No API key configured in {:?}; summaries will use the fallback text",
            Config::config_path()
        );
    }

    let summarizer = Arc::new(Summarizer::new(SummarizerConfig::from(&config))?);
    let (router, _router_task) = Router::new(summarizer, Arc::clone(&store)).spawn();
    let fetcher = Arc::new(PageFetcher::new()?);

    match command {
        Command::Stdio => protocol::serve_stdio(&router).await,
        Command::Summarize(url) => summarize_headless(&router, &fetcher, &url).await,
        Command::Tui { page_url } => {
            let mut app = App::new(store, router, fetcher, OverlaySettings::from(&config)).await?;
            if let Some(url) = page_url {
                app.load_page(url);
            }
            run_tui(&mut app).await
        }
        Command::List(_) | Command::History(_) => Ok(()),
    }
}

async fn summarize_headless(router: &RouterHandle, fetcher: &PageFetcher, url: &str) -> Result<()> {
    let (title, text) = match fetcher.fetch(url).await {
        Ok(page) => (page.title, page.text),
        Err(e) => {
            tracing::warn!("Could not fetch {}: {}", url, e);
            (url.to_string(), url.to_string())
        }
    };

    let response = router
        .summarize(SummarizeRequest {
            text,
            url: url.to_string(),
            title,
            force_reload: false,
        })
        .await?;

    match response {
        Response::Summary { summary } => {
            println!("{summary}");
            Ok(())
        }
        Response::Error { error } => Err(error::AppError::Api(error)),
    }
}

async fn print_grouped(store: &Store, query: &str) -> Result<()> {
    if store.count().await? == 0 {
        println!("No summaries stored yet.");
        return Ok(());
    }

    let records = store.get_all().await?;
    let visible = filter_records(&records, query);
    if visible.is_empty() {
        println!("No summaries match {query:?}.");
        return Ok(());
    }

    for group in group_by_day(&visible) {
        println!("{} ({} summaries)", group.date, group.records.len());
        for record in group.records {
            println!("  [{}] {} <{}>", record.id, record.title, record.url);
            for line in textwrap::wrap(&record.summary, 76) {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

async fn print_history(store: &Store, url: &str) -> Result<()> {
    let records = store.get_by_url(url).await?;
    if records.is_empty() {
        println!("No summaries stored for {url}.");
        return Ok(());
    }
    for record in records {
        println!(
            "[{}] {}\n{}\n",
            record.id,
            record.created_at().format("%Y-%m-%d %H:%M:%S UTC"),
            record.summary
        );
    }
    Ok(())
}

async fn run_tui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Advance hover debounce and tooltip grace timers
        app.tick();

        // Poll for completed summaries and page loads
        app.poll_results().await?;

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.input_mode(), app.trigger_key()) {
                        let should_quit = app.handle_action(action).await?;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
