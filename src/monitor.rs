//! Replay monitoring against the scoring endpoint.
//!
//! The replay loop is deliberately sequential and blocking: one row is
//! sent, awaited, and recorded before the next. Outcomes land in a
//! bounded in-memory window for the live view and in an append-only CSV
//! log for the history view, which only ever reads.

use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::features::{self, Dataset};
use crate::types::{DetectionRecord, Prediction};

/// Build one feature mapping per dataset row for replay.
///
/// Mirrors what a live sensor would send: every numeric column (all of
/// its cells missing or parseable) becomes a feature, missing and
/// non-finite cells become 0.0. Rows are not dropped here — serving
/// input is best-effort, unlike training input.
pub fn numeric_feature_maps(dataset: &Dataset) -> (Vec<String>, Vec<HashMap<String, f64>>) {
    let numeric: Vec<usize> = dataset
        .headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| {
            dataset.rows.iter().all(|row| match row.get(i) {
                Some(cell) => {
                    features::is_missing(cell) || cell.trim().parse::<f64>().is_ok()
                }
                None => true,
            })
        })
        .map(|(i, _)| i)
        .collect();

    let columns: Vec<String> = numeric
        .iter()
        .map(|&i| dataset.headers[i].clone())
        .collect();

    let maps = dataset
        .rows
        .iter()
        .map(|row| {
            numeric
                .iter()
                .map(|&i| {
                    let value = row
                        .get(i)
                        .filter(|cell| !features::is_missing(cell))
                        .and_then(|cell| cell.trim().parse::<f64>().ok())
                        .filter(|v| v.is_finite())
                        .unwrap_or(0.0);
                    (dataset.headers[i].clone(), value)
                })
                .collect()
        })
        .collect();

    (columns, maps)
}

/// Blocking HTTP client for the scoring endpoint.
pub struct ReplayClient {
    agent: ureq::Agent,
    url: String,
}

impl ReplayClient {
    /// Client with a short per-call timeout; the replay run itself has none.
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.to_string(),
        }
    }

    /// Score one flow's feature mapping.
    pub fn score(&self, features: &HashMap<String, f64>) -> Result<Prediction> {
        let response = self
            .agent
            .post(&self.url)
            .send_json(serde_json::json!({ "features": features }))
            .with_context(|| format!("scoring request to {} failed", self.url))?;
        response
            .into_json()
            .context("failed to decode scoring response")
    }
}

/// Bounded FIFO window over the most recent detections.
pub struct RollingHistory {
    records: VecDeque<DetectionRecord>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append a record, evicting the oldest when at capacity.
    pub fn push(&mut self, record: DetectionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.records.iter()
    }
}

/// Append-only CSV detection log, single writer, re-read whole by readers.
pub struct DetectionLog {
    path: PathBuf,
}

impl DetectionLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Append one record, writing the header only on file creation.
    pub fn append(&self, record: &DetectionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log dir {}", parent.display())
                })?;
            }
        }

        let new_file = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open log {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if new_file {
            writer
                .write_record(["timestamp", "prediction", "confidence"])
                .context("failed to write log header")?;
        }
        writer.serialize(record).context("failed to append log row")?;
        writer.flush().context("failed to flush log")?;
        Ok(())
    }

    /// Read every log row. A missing file means no detections yet, and a
    /// truncated or malformed line (a reader can catch the writer
    /// mid-append) is skipped, never an error.
    pub fn read_all(&self) -> Result<Vec<DetectionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open log {}", self.path.display()))?;

        let mut records = Vec::new();
        for result in reader.deserialize::<DetectionRecord>() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => debug!(error = %e, "Skipping unreadable log line"),
            }
        }
        Ok(records)
    }
}

/// High-confidence alert rule: the confidence bound is a strict
/// greater-than, so exactly 0.9 does not alert.
pub fn is_high_confidence_alert(prediction: &Prediction, config: &MonitorConfig) -> bool {
    prediction.prediction == config.alert_label
        && prediction.confidence > config.alert_confidence
}

/// Render the rolling window as a terminal report.
pub fn render_live_summary(history: &RollingHistory, total_alerts: u64) {
    let mut counts: Vec<(String, u64)> = Vec::new();
    for record in history.iter() {
        match counts.iter_mut().find(|(label, _)| *label == record.prediction) {
            Some((_, count)) => *count += 1,
            None => counts.push((record.prediction.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    info!("── Recent predictions ──────────────────────────────");
    for (label, count) in &counts {
        let bar: String = "█".repeat((*count as usize).min(40));
        info!("  {:<20} {:>5}  {}", label, count, bar);
    }
    if let Some(last) = history.iter().last() {
        info!(
            "  last: {} {} (confidence {:.4})",
            last.timestamp, last.prediction, last.confidence
        );
    }
    info!("  window: {} rows, total alerts: {}", history.len(), total_alerts);
}

/// Render the whole persisted log as an aggregate report.
pub fn render_history(records: &[DetectionRecord]) {
    if records.is_empty() {
        info!("No logged detections yet. Run the replay monitor first.");
        return;
    }

    let mut counts: Vec<(String, u64)> = Vec::new();
    let mut confidence_sum = 0.0;
    for record in records {
        confidence_sum += record.confidence;
        match counts.iter_mut().find(|(label, _)| *label == record.prediction) {
            Some((_, count)) => *count += 1,
            None => counts.push((record.prediction.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    info!("── Detection history ({} rows) ─────────────────────", records.len());
    for (label, count) in &counts {
        let pct = *count as f64 / records.len() as f64 * 100.0;
        let bar: String = "█".repeat((pct / 2.5) as usize);
        info!("  {:<20} {:>6} ({:>5.1}%) {}", label, count, pct, bar);
    }
    info!(
        "  mean confidence: {:.4}",
        confidence_sum / records.len() as f64
    );
    for record in records.iter().skip(records.len().saturating_sub(10)) {
        info!(
            "  {} {:<16} {:.4}",
            record.timestamp, record.prediction, record.confidence
        );
    }
}
