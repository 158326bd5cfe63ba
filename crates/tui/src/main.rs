mod app;

use anyhow::Result;
use std::fs::{self, OpenOptions};

use gu3ss_core::{
    config::{self, AppConfig},
    FileScoreStore, Game, OpenRouteService,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;

    let provider = OpenRouteService::new(&config.routing)?;
    let store = FileScoreStore::new(FileScoreStore::default_path());
    let (game, round_rx) = Game::from_config(&config, provider, store)?;
    tracing::info!(
        points = game.catalog().len(),
        levels = game.rules().level_count,
        "game ready"
    );

    let mut app = app::Gu3ssApp::new(game);
    app.attach_rounds(round_rx);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("gu3ss.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // No stdout layer while the UI holds the terminal.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
