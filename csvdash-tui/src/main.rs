//! csvdash-tui: Terminal client for the CSV file dashboard
//!
//! - Login and signup against the dashboard API
//! - File list with view, upload and delete
//! - Live refresh over the WebSocket channel

mod app;
mod input;
mod ui;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{App, AppResult};
use crate::input::{handle_key, handle_mouse};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to file, stdout belongs to the terminal UI
    let log_file = dirs::cache_dir()
        .map(|d| d.join("csvdash").join("tui.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("csvdash-tui.log"));

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(std::path::Path::new(".")),
        log_file
            .file_name()
            .unwrap_or(std::ffi::OsStr::new("csvdash-tui.log")),
    );

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csvdash_tui=debug,csvdash_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(file_appender))
        .init();

    let config = csvdash_core::Config::load().unwrap_or_else(|e| {
        warn!("Using default config: {}", e);
        csvdash_core::Config::default()
    });
    info!("API at {}, live channel at {}", config.server.api_url, config.server.ws_url);

    let mouse = config.client.tui.mouse;
    let mut app = App::new(config)?;
    app.start().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    if mouse {
        execute!(stdout, EnableMouseCapture)?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    if mouse {
        execute!(terminal.backend_mut(), DisableMouseCapture)?;
    }
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll with a timeout so live events and expiry checks keep flowing
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => match handle_key(app, key).await {
                    AppResult::Continue => {}
                    AppResult::Quit => return Ok(()),
                },
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                _ => {}
            }
        }

        app.tick().await;
    }
}
