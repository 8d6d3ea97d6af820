//! Tangent
//!
//! Terminal infinite canvas for branching conversations across LLM providers.

mod app;
mod handler;
mod layout;
mod tui;
mod ui;

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tangent_core::{Config, FileStorage, KeyStore, LocalStorage, MemoryStorage};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "tangent", version)]
#[command(about = "Infinite canvas for branching LLM conversations")]
struct Cli {
    /// Relay endpoint (overrides the config file)
    #[arg(long)]
    relay_url: Option<String>,
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = init_logging() {
        eprintln!("tangent: logging disabled: {e}");
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "using default config");
            Config::default()
        }),
    };
    if let Some(url) = cli.relay_url {
        config.relay_url = url;
    }
    let config_path = match cli.config {
        Some(path) => Some(path),
        None => Config::get_config_path().ok(),
    };

    let key_store = KeyStore::new(open_storage(&config));

    let mut terminal = tui::init()?;
    tui::install_panic_hook();

    let mut events = EventHandler::new();
    let mut app = App::new(&config, config_path, key_store, events.sender());
    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// The screen belongs to the UI, so logs go to `tangent.log` in the config directory
fn init_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    fs::create_dir_all(&dir)?;
    let file = File::options()
        .create(true)
        .append(true)
        .open(dir.join("tangent.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn open_storage(config: &Config) -> Box<dyn LocalStorage> {
    let path = match &config.storage_path {
        Some(path) => Ok(path.clone()),
        None => FileStorage::default_path(),
    };
    match path {
        Ok(path) => {
            let storage = FileStorage::new(path);
            info!(path = %storage.path().display(), "credential storage");
            Box::new(storage)
        }
        Err(e) => {
            warn!(error = %e, "keys will not persist");
            Box::new(MemoryStorage::default())
        }
    }
}
