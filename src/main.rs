mod codegen;
mod config;
mod http;
mod models;
mod service;
mod storage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use config::{Config, DatabaseBackend};
use http::uploads::UploadStore;
use http::AppState;
use service::LinkService;
use storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!("Storing uploads in {}", config.upload_dir);

    let state = Arc::new(AppState {
        service: LinkService::new(Arc::clone(&storage)),
        uploads: UploadStore::new(&config.upload_dir),
        base_url: config.public_base_url.clone(),
        static_dir: config.static_dir.clone(),
    });

    let app = http::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    info!("Public base URL: {}", config.public_base_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down, closing storage");
    storage.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
