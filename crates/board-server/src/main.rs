mod journal;
mod live;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use board_db::Database;
use board_gateway::{MemoryStore, StoreOptions};
use board_types::api::InitConfig;
use board_widget::ClockStyle;

use crate::journal::DbJournal;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "board_server=debug,board_widget=debug,board_gateway=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("BOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BOARD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("BOARD_DB_PATH")
        .unwrap_or_else(|_| "board.db".into())
        .into();
    let static_dir: PathBuf = std::env::var("BOARD_STATIC_DIR")
        .unwrap_or_else(|_| concat!(env!("CARGO_MANIFEST_DIR"), "/static").into())
        .into();

    let mut config =
        InitConfig::new(std::env::var("BOARD_PROJECT_ID").unwrap_or_else(|_| "board-local".into()));
    if let Ok(collection) = std::env::var("BOARD_COLLECTION") {
        config.collection = collection;
    }
    if let Ok(path) = std::env::var("BOARD_PRESENCE_PATH") {
        config.presence_path = path;
    }
    config.live_url = Some(routes::LIVE_PATH.to_string());
    let clock = ClockStyle::from_env();

    // Init database and restore the comment collection
    let db = Arc::new(Database::open(&db_path)?);
    let documents = db.load_collection(&config.collection)?;
    let stored = db.count_documents(&config.collection)?;
    if documents.len() < stored {
        tracing::warn!(
            "Restored {} of {} stored documents in '{}'",
            documents.len(),
            stored,
            config.collection
        );
    } else {
        info!("Restored {} documents in '{}'", stored, config.collection);
    }

    let store = MemoryStore::with_options(StoreOptions {
        journal: Some(Arc::new(DbJournal::new(db))),
        ..StoreOptions::default()
    });
    store.restore(&config.collection, documents);

    let state = AppState {
        store,
        config,
        clock,
    };
    let app = routes::app(state, &static_dir);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Board server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
