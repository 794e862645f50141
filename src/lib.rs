//! jobpulse -- health, root-cause and trend analysis for artifact job pipelines.
//!
//! This crate provides the core library: time window resolution, the job
//! record store, the analysis engine, exports, and the HTTP API over them.

pub mod analysis;
pub mod api;
pub mod config;
pub mod export;
pub mod jobs;
pub mod source;
pub mod storage;
pub mod window;

use anyhow::{Context, Result};
use std::sync::Arc;

/// Start the jobpulse API server.
pub async fn serve(config: &config::AppConfig) -> Result<()> {
    // 1. Initialize Storage
    let db_path = config.storage.db_path.to_string_lossy().into_owned();
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(&db_path)?;

    // 2. Build the engine
    let engine = analysis::HealthEngine::new(config.analysis()?);
    tracing::info!(
        fetch_limit = engine.config().fetch_limit,
        artifact_names = engine.config().artifact_names.len(),
        "Analysis engine ready"
    );

    // 3. Start API Server
    let state = api::state::AppState {
        engine: Arc::new(engine),
        source: storage::SqliteSource::new(pool),
        export: config.export.clone(),
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    tracing::info!(%addr, "jobpulse listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
