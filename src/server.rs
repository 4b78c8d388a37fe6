use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::store::db::{DbHandle, TicketDb};
use crate::wiki::OptionsCatalog;

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Start the ticket server.
pub async fn start_server(config: Config) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let db = TicketDb::new(&config.db_path).context("Failed to initialize ticket database")?;
    let catalog = OptionsCatalog::load(&config.wiki_dir)
        .with_context(|| format!("Failed to load wiki catalog from {}", config.wiki_dir.display()))?;

    let dev_mode = config.dev_mode;
    let port = config.port;
    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        catalog,
        config,
    });

    let mut app = build_router(state);
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!("spooldesk running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("shutting down");
}
