//! Live Replay Monitor
//!
//! Replays a dataset row by row against the scoring endpoint at a
//! configured rate, logging outcomes and raising high-confidence alerts.
//! With the `history` mode it instead renders the persisted detection
//! log with a periodic auto-refresh.

use std::time::{Duration, Instant};

use anyhow::Result;
use intrusion_detection_pipeline::{
    config::AppConfig,
    features,
    metrics::PipelineMetrics,
    monitor::{
        is_high_confidence_alert, numeric_feature_maps, render_history, render_live_summary,
        DetectionLog, ReplayClient, RollingHistory,
    },
    types::{AlertEvent, DetectionRecord},
};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intrusion_detection_pipeline=info".parse()?)
                .add_directive("monitor=info".parse()?),
        )
        .init();

    // Parse arguments: [config path] [mode: replay|history]
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/pipeline.yaml");
    let mode = args.get(2).map(|s| s.as_str()).unwrap_or("replay");

    let config = AppConfig::load_from_path(config_path)?;

    match mode {
        "history" => run_history(&config),
        _ => run_replay(&config),
    }
}

fn run_replay(config: &AppConfig) -> Result<()> {
    info!(
        dataset = %config.dataset.path,
        api_url = %config.monitor.api_url,
        rate = config.monitor.rows_per_second,
        "Starting live replay"
    );

    let dataset = features::load_dataset(&config.dataset.path)?;
    let (columns, feature_maps) = numeric_feature_maps(&dataset);
    info!(
        rows = feature_maps.len(),
        numeric_columns = columns.len(),
        "Dataset loaded for replay"
    );

    let client = ReplayClient::new(&config.monitor.api_url, Duration::from_secs(3));
    let log = DetectionLog::new(&config.monitor.log_path);
    let metrics = PipelineMetrics::new();
    let mut history = RollingHistory::new(config.monitor.history_size);
    let delay = Duration::from_secs_f64(1.0 / config.monitor.rows_per_second.max(1) as f64);

    for (row, flow) in feature_maps.iter().enumerate() {
        let start = Instant::now();
        match score_one(&client, &log, flow) {
            Ok((prediction, record)) => {
                metrics.record_scored(start.elapsed(), prediction.confidence);
                if is_high_confidence_alert(&prediction, &config.monitor) {
                    metrics.record_alert();
                    let alert = AlertEvent::new(
                        prediction.prediction.clone(),
                        prediction.confidence,
                    );
                    warn!(
                        alert_id = %alert.alert_id,
                        prediction = %alert.prediction,
                        confidence = alert.confidence,
                        "High-confidence attack detected!"
                    );
                }

                history.push(record);
                if (row + 1) % 10 == 0 {
                    render_live_summary(&history, total_alerts(&metrics));
                }
                std::thread::sleep(delay);
            }
            Err(e) => {
                // Per-row failures are surfaced and skipped, never fatal.
                metrics.record_failure();
                error!(row, error = %e, "Scoring call failed");
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }

    info!(rows = feature_maps.len(), "Replay complete");
    render_live_summary(&history, total_alerts(&metrics));
    metrics.print_summary();

    Ok(())
}

fn total_alerts(metrics: &PipelineMetrics) -> u64 {
    metrics
        .alerts_raised
        .load(std::sync::atomic::Ordering::Relaxed)
}

/// Score one flow and persist the outcome; any failure skips the row.
fn score_one(
    client: &ReplayClient,
    log: &DetectionLog,
    flow: &std::collections::HashMap<String, f64>,
) -> Result<(intrusion_detection_pipeline::Prediction, DetectionRecord)> {
    let prediction = client.score(flow)?;
    let record = DetectionRecord::now(&prediction);
    log.append(&record)?;
    Ok((prediction, record))
}

fn run_history(config: &AppConfig) -> Result<()> {
    info!(
        log = %config.monitor.log_path,
        refresh_secs = config.monitor.refresh_secs,
        "Starting detection history view"
    );

    let log = DetectionLog::new(&config.monitor.log_path);
    loop {
        let records = log.read_all()?;
        render_history(&records);
        if !config.monitor.auto_refresh {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(config.monitor.refresh_secs.max(1)));
    }
}
