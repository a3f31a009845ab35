//! prefpop - A terminal viewer for Japanese prefecture population trends.
//!
//! Pick prefectures and a population category; the chart plots each
//! prefecture's series from the RESAS open data API.

mod app;
mod api;
mod cache;
mod config;
mod models;
mod orchestrator;
mod ui;
mod utils;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::ApiClient;
use app::{App, AppState};
use config::Config;
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "prefpop.log";

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so events go to a log file. The returned
/// guard flushes the writer on drop and must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = config
        .log_dir()
        .and_then(|dir| std::fs::create_dir_all(&dir).map(|_| dir).map_err(Into::into));

    match log_dir {
        Ok(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::sink))
                .with(filter)
                .init();
            None
        }
    }
}

fn build_client(config: &Config) -> Result<ApiClient> {
    let api_key = config::api_key_from_env();
    ApiClient::new(
        config.api_endpoint(),
        api_key.as_deref(),
        config.request_timeout(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize logging
    let _log_guard = init_tracing(&config);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--list-prefectures") => return list_prefectures(&config).await,
        Some("--dump-population") => {
            let code = args
                .get(2)
                .context("Usage: prefpop --dump-population <prefCode>")?
                .parse::<u32>()
                .context("prefCode must be a positive integer")?;
            return dump_population(&config, code).await;
        }
        Some(other) => anyhow::bail!("Unknown argument: {}", other),
        None => {}
    }

    info!("prefpop starting");

    let api = build_client(&config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and start background work
    let mut app = App::new(config, api);
    app.start();

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

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("prefpop shutting down");
    Ok(())
}

/// Print the prefecture directory to stdout as JSON
async fn list_prefectures(config: &Config) -> Result<()> {
    let api = build_client(config)?;
    let regions = api
        .try_fetch_prefectures()
        .await
        .context("Failed to fetch prefectures")?;

    eprintln!("Found {} prefectures", regions.len());
    println!("{}", serde_json::to_string_pretty(&regions)?);
    Ok(())
}

/// Print every population category for one prefecture to stdout as JSON
async fn dump_population(config: &Config, pref_code: u32) -> Result<()> {
    use serde::Serialize;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct PopulationOutput {
        pref_code: u32,
        pref_name: String,
        boundary_year: Option<i32>,
        series: Vec<models::CachedSeries>,
    }

    let api = build_client(config)?;
    let regions = api
        .try_fetch_prefectures()
        .await
        .context("Failed to fetch prefectures")?;
    let region = models::find_region(&regions, pref_code)
        .with_context(|| format!("Unknown prefCode {}", pref_code))?;

    eprintln!("Fetching population composition for {}...", region.name);
    let composition = api
        .try_fetch_composition(pref_code)
        .await
        .with_context(|| format!("Failed to fetch population for {}", region.name))?;

    let boundary_year = composition.boundary_year;
    let series = models::Category::ALL
        .iter()
        .map(|&category| api::client::extract_series(&composition, &region.name, category))
        .collect::<Result<Vec<_>, _>>()
        .context("Unexpected composition response")?;

    let output = PopulationOutput {
        pref_code,
        pref_name: region.name.clone(),
        boundary_year,
        series,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
