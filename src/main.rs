mod api;
mod app;
mod config;
mod review;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{Backend, ListFilter, ListQuery};
use app::App;
use config::AppConfig;
use review::MappingReview;

#[derive(Parser, Debug)]
#[command(name = "stocker-review")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "A terminal console for reviewing news-to-stock mappings")]
struct Args {
    /// Use bundled sample data instead of the API
    #[arg(long)]
    offline: bool,

    /// Base URL of the stocker API (overrides config)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Print one page of the news mapping list as JSON
    #[arg(short, long)]
    list: bool,

    /// Status filter for --list
    #[arg(long, value_enum, default_value_t = ListFilter::All)]
    filter: ListFilter,

    /// Page number for --list (0-based)
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Title or company-name search for --list
    #[arg(long)]
    search: Option<String>,

    /// Print the save payload of an unedited review of this news item as JSON
    #[arg(short, long, value_name = "NEWS_ID")]
    payload: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, so JSON output and the TUI stay clean)
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_default();
    if args.offline {
        config.offline = true;
    }
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }

    let backend = Backend::from_config(&config).context("Could not create backend client")?;

    // Handle CLI-only commands
    if args.list {
        let query = ListQuery {
            filter: args.filter,
            page: args.page,
            size: config.page_size,
            search: args.search.clone(),
        };
        return print_list(&backend, &query).await;
    }

    if let Some(news_id) = args.payload {
        return print_payload(&backend, &config, news_id).await;
    }

    // Run TUI
    ui::init_theme(theme::Theme::from_config(&config.theme));
    run_tui(&config, backend).await
}

async fn print_list(backend: &Backend, query: &ListQuery) -> Result<()> {
    let page = backend
        .list(query)
        .await
        .context("Failed to fetch news mapping list")?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

async fn print_payload(backend: &Backend, config: &AppConfig, news_id: i64) -> Result<()> {
    let detail = backend
        .detail(news_id)
        .await
        .with_context(|| format!("Failed to load news {}", news_id))?;
    let review = MappingReview::new(&detail, config.toggle_policy);
    println!("{}", serde_json::to_string_pretty(&review.payload())?);
    Ok(())
}

async fn run_tui(config: &AppConfig, backend: Backend) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term)?;

    // Create app state
    let mut app = App::new(config, backend);
    app.reload_list();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll on a blocking thread so spawned backend calls keep running
        let polled = tokio::task::spawn_blocking(|| -> io::Result<Option<Event>> {
            if event::poll(std::time::Duration::from_millis(100))? {
                Ok(Some(event::read()?))
            } else {
                Ok(None)
            }
        })
        .await??;

        if let Some(Event::Key(key)) = polled {
            if key.kind == KeyEventKind::Press {
                // Handle key and catch any errors to prevent crashes
                if let Err(e) = app.handle_key(key) {
                    tracing::warn!("Key handling failed: {}", e);
                    app.status_message = Some(format!("오류: {}", e));
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }

        // Apply finished backend calls
        app.tick();
    }
}
