//! Scoring Endpoint - Main Entry Point
//!
//! Loads the current model bundle once, then serves single-flow
//! classification over HTTP until terminated.

use std::sync::Arc;

use anyhow::{Context, Result};
use intrusion_detection_pipeline::{
    config::AppConfig,
    metrics::{MetricsReporter, PipelineMetrics},
    model::{bundle::ModelBundle, scorer::Scorer},
    server::{create_router, AppState},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intrusion_detection_pipeline=info".parse()?)
                .add_directive("serve=info".parse()?),
        )
        .init();

    info!("Starting intrusion detection scoring endpoint");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/pipeline.yaml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;
    info!(config = %config_path, "Configuration loaded");

    // The bundle is loaded exactly once; it stays read-only for the
    // lifetime of the process (no hot reload).
    let bundle = ModelBundle::load(config.bundle_path())?;
    let scorer = Arc::new(Scorer::new(bundle));
    let metrics = Arc::new(PipelineMetrics::new());

    // Periodic metrics summary, like the rest of the pipeline tools.
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(reporter_metrics, 60);
        reporter.start().await;
    });

    let state = AppState { scorer, metrics };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "Scoring endpoint listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
