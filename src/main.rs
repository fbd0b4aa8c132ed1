// Social Graph Server - REST API for accounts, posts, follows and notifications

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use social_graph::{api::create_router, app_state::AppState, config::Config};

/// Make sure the directory holding a file-backed SQLite database exists.
fn ensure_database_dir(url: &str) -> anyhow::Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if path.starts_with(':') {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("social_graph=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    ensure_database_dir(&config.database.url)?;
    std::fs::create_dir_all(&config.storage.root)
        .with_context(|| format!("failed to create storage root {}", config.storage.root))?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;
    let app = create_router(app_state);

    let addr = config.server_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Social graph server listening on http://{}", addr);
    info!("Serving uploads from {} at /storage", config.storage.root);

    axum::serve(listener, app).await?;
    Ok(())
}
