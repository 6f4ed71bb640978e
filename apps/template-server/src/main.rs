///! Template Server
///! REST API for video template documents and media uploads

mod api;
mod config;
mod models;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use storage::{CloudinaryMediaStore, FsTemplateStore, LocalMediaStore, MediaStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::{Config, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting Template Server...");

    let templates = Arc::new(
        FsTemplateStore::open(&config.data_dir)
            .with_context(|| format!("opening data directory {}", config.data_dir.display()))?,
    );

    let policy = config.upload_policy();
    info!(
        max_bytes = policy.max_bytes,
        formats = %policy.allowed_extensions.join(","),
        "upload policy"
    );
    let (media, uploads_dir): (Arc<dyn MediaStore>, Option<PathBuf>) = match config.cloudinary() {
        Some(cloudinary) => {
            info!(cloud = %cloudinary.cloud_name, folder = %cloudinary.folder, "uploads go to Cloudinary");
            let store: Arc<dyn MediaStore> = Arc::new(CloudinaryMediaStore::new(cloudinary, policy)?);
            (store, None)
        }
        None => {
            let store: Arc<dyn MediaStore> = Arc::new(
                LocalMediaStore::open(&config.uploads_dir, policy).with_context(|| {
                    format!("opening uploads directory {}", config.uploads_dir.display())
                })?,
            );
            info!(path = %config.uploads_dir.display(), "uploads stored locally");
            (store, Some(config.uploads_dir.clone()))
        }
    };

    let state = Arc::new(AppState { templates, media });
    let app = api::router(state, uploads_dir.as_deref(), config.body_limit());

    info!("Template server listening on http://{}", config.bind);
    info!("API endpoints:");
    info!("  GET  /templates            - List templates");
    info!("  POST /templates            - Save a new template");
    info!("  GET  /templates/:filename  - Fetch a template");
    info!("  PUT  /templates/:filename  - Overwrite a template");
    info!("  POST /upload               - Upload a media file");
    info!("  GET  /health               - Liveness check");

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Template server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
