//! Model Training Entry Point
//!
//! Runs one training pass from a YAML config and reports where the
//! bundle, run record, and registry entry landed.

use anyhow::Result;
use intrusion_detection_pipeline::{config::AppConfig, registry, trainer};
use tracing::info;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intrusion_detection_pipeline=info".parse()?)
                .add_directive("train=info".parse()?),
        )
        .init();

    // Parse arguments: [config path] [run name]
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/pipeline.yaml");
    let run_name = args.get(2).map(|s| s.as_str());

    info!(config = %config_path, "Starting training run");
    let config = AppConfig::load_from_path(config_path)?;

    let outcome = trainer::train_from_config(&config, run_name)?;

    info!(
        model_id = %outcome.model_id,
        path = %outcome.model_path.display(),
        "Training complete"
    );
    info!(
        accuracy = outcome.evaluation.metrics.accuracy,
        macro_precision = outcome.evaluation.metrics.macro_precision,
        macro_recall = outcome.evaluation.metrics.macro_recall,
        macro_f1 = outcome.evaluation.metrics.macro_f1,
        "Held-out metrics"
    );
    if let Some(record) = &outcome.run_record {
        info!(path = %record.display(), "Run record");
    }

    let entries = registry::read_entries(&outcome.registry_path)?;
    info!(
        total_models = entries.len(),
        registry = %outcome.registry_path.display(),
        "Registry updated"
    );

    Ok(())
}
