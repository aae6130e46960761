//! Performance and degradation counters for the scoring pipeline.
//!
//! Cleaning drops rows silently and scoring defaults missing features
//! silently; the counters here are the observability hooks for both,
//! alongside the usual latency and throughput stats.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::info;

/// Metrics collector shared across the scoring endpoint and the monitor.
pub struct PipelineMetrics {
    /// Total scoring requests answered
    pub flows_scored: AtomicU64,
    /// Scoring requests that failed outright
    pub scoring_failures: AtomicU64,
    /// High-confidence alerts raised
    pub alerts_raised: AtomicU64,
    /// Feature values defaulted to 0.0 at scoring time
    pub features_defaulted: AtomicU64,
    /// Scoring latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Confidence distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            flows_scored: AtomicU64::new(0),
            scoring_failures: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            features_defaulted: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one answered scoring request.
    pub fn record_scored(&self, latency: Duration, confidence: f64) {
        self.flows_scored.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            // Keep only the most recent samples for memory efficiency
            if latencies.len() > 10000 {
                latencies.drain(0..5000);
            }
        }

        let bucket = (confidence * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_failure(&self) {
        self.scoring_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_defaulted_features(&self, count: u64) {
        self.features_defaulted.fetch_add(count, Ordering::Relaxed);
    }

    /// Get scoring latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let latencies = self.latencies.read().unwrap();
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = latencies.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (scored flows per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.flows_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get confidence distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        *self.confidence_buckets.read().unwrap()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.flows_scored.load(Ordering::Relaxed);
        let failures = self.scoring_failures.load(Ordering::Relaxed);
        let alerts = self.alerts_raised.load(Ordering::Relaxed);
        let defaulted = self.features_defaulted.load(Ordering::Relaxed);

        let latency = self.get_latency_stats();
        let throughput = self.get_throughput();
        let distribution = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║         INTRUSION DETECTION PIPELINE - METRICS SUMMARY       ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Flows Scored:    {:>10}  │  Throughput: {:>8.1} flows/s ║",
            scored, throughput
        );
        info!(
            "║ Alerts Raised:   {:>10}  │  Failures:   {:>10}        ║",
            alerts, failures
        );
        info!(
            "║ Features Defaulted to 0.0:  {:>10}                       ║",
            defaulted
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}     ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Confidence Distribution:                                     ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
