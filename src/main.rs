use anyhow::Context;
use log::info;

use voxnova::config::AppConfig;
use voxnova::http::{AppState, router};
use voxnova::utils::logger::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализируем логгер с тонкой настройкой
    init_logger();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tokio::fs::create_dir_all(&config.storage.root_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage.root_dir.display()))?;

    let state = AppState::from_config(&config).context("Failed to initialize services")?;
    if config.tts.has_primary_credential() {
        info!("VoiceRSS is the primary speech provider");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("Listening on {}", config.server.bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
