use std::net::SocketAddr;
use std::sync::Arc;

use storage::FilesystemBlobStore;
use tokio::signal;
use tracing::{Level, info};

use notes_server::config::AppConfig;
use notes_server::database::init_db;
use notes_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;

    let db = init_db(&config.database).await?;
    info!("Database ready");

    // The upload directory must exist before the first request.
    let blob_store = FilesystemBlobStore::new(
        config.storage.upload_dir.clone(),
        config.storage.max_upload_size,
    )
    .await?;
    info!(
        "Storing uploads in {}",
        blob_store.base_path().display()
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        db,
        blob_store: Arc::new(blob_store),
        config,
    };
    let app = notes_server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}
