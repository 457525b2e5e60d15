use anyhow::Context;
use tracing::{Level, info};

use server::config::AppConfig;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load config")?;
    let store = common::storage::open(&config.storage)
        .await
        .context("Failed to open blob store")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::build_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
