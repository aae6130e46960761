//! Configuration management for the intrusion-detection pipeline

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Main pipeline configuration, shared by the train/serve/monitor
/// binaries. Every key except `dataset.path` has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Training/replay dataset location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the labeled CSV dataset. Required.
    pub path: String,
}

/// Train/test split settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Held-out fraction in (0, 1).
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Preserve per-label proportions across the partitions.
    #[serde(default = "default_true")]
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            stratify: true,
        }
    }
}

/// Forest hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Unlimited when absent.
    #[serde(default)]
    pub max_depth: Option<u16>,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_depth: None,
            min_samples_leaf: default_min_samples_leaf(),
            min_samples_split: default_min_samples_split(),
        }
    }
}

/// Bundle and registry output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    /// Defaults to `<dir>/model_registry.json` when absent.
    #[serde(default)]
    pub registry_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            registry_path: None,
        }
    }
}

/// Experiment-tracking toggles (local JSON run records).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to `run-<timestamp>` when absent.
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default = "default_tracking_dir")]
    pub dir: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_name: None,
            dir: default_tracking_dir(),
        }
    }
}

/// Scoring endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Defaults to `<output.dir>/current.bin` when absent.
    #[serde(default)]
    pub bundle_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            bundle_path: None,
        }
    }
}

/// Replay monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_rows_per_second")]
    pub rows_per_second: u32,
    /// Rolling in-memory window capacity.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Attack class that can raise the high-confidence alert.
    #[serde(default = "default_alert_label")]
    pub alert_label: String,
    /// Strict lower bound on alerting confidence.
    #[serde(default = "default_alert_confidence")]
    pub alert_confidence: f64,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    /// History-view refresh interval in seconds.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    /// Render the history view once and exit when false.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            rows_per_second: default_rows_per_second(),
            history_size: default_history_size(),
            alert_label: default_alert_label(),
            alert_confidence: default_alert_confidence(),
            log_path: default_log_path(),
            refresh_secs: default_refresh_secs(),
            auto_refresh: true,
        }
    }
}

fn default_random_state() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_n_trees() -> usize {
    100
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_min_samples_split() -> usize {
    2
}

fn default_output_dir() -> String {
    "models".to_string()
}

fn default_tracking_dir() -> String {
    "runs".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000/predict".to_string()
}

fn default_rows_per_second() -> u32 {
    5
}

fn default_history_size() -> usize {
    100
}

fn default_alert_label() -> String {
    "DDoS".to_string()
}

fn default_alert_confidence() -> f64 {
    0.9
}

fn default_log_path() -> String {
    "logs/detections.csv".to_string()
}

fn default_refresh_secs() -> u64 {
    5
}

impl AppConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/pipeline.yaml")
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Registry file location, defaulting under the output directory.
    pub fn registry_path(&self) -> PathBuf {
        match &self.output.registry_path {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.output.dir).join("model_registry.json"),
        }
    }

    /// Bundle the scoring endpoint loads at startup.
    pub fn bundle_path(&self) -> PathBuf {
        match &self.server.bundle_path {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.output.dir).join(crate::model::bundle::CURRENT_BUNDLE),
        }
    }

    /// Short content hash of the configuration, recorded in the registry.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical =
            serde_json::to_vec(self).context("failed to serialize configuration")?;
        let digest = Sha256::digest(&canonical);
        Ok(hex::encode(digest)[..12].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_config() -> AppConfig {
        AppConfig {
            dataset: DatasetConfig {
                path: "data/flows.csv".to_string(),
            },
            split: SplitConfig::default(),
            random_state: default_random_state(),
            model: ModelConfig::default(),
            output: OutputConfig::default(),
            tracking: TrackingConfig::default(),
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = minimal_config();
        assert_eq!(config.split.test_size, 0.2);
        assert!(config.split.stratify);
        assert_eq!(config.random_state, 42);
        assert_eq!(config.model.n_trees, 100);
        assert_eq!(config.monitor.alert_label, "DDoS");
        assert_eq!(config.monitor.alert_confidence, 0.9);
        assert_eq!(
            config.registry_path(),
            PathBuf::from("models/model_registry.json")
        );
        assert_eq!(config.bundle_path(), PathBuf::from("models/current.bin"));
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "dataset:\n  path: data/flows.csv\nsplit:\n  test_size: 0.3\nmodel:\n  n_trees: 10"
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.dataset.path, "data/flows.csv");
        assert_eq!(config.split.test_size, 0.3);
        assert!(config.split.stratify); // default fills the omitted key
        assert_eq!(config.model.n_trees, 10);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_missing_dataset_path_is_fatal() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(file, "split:\n  test_size: 0.3").unwrap();

        assert!(AppConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = minimal_config().fingerprint().unwrap();
        let b = minimal_config().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);

        let mut changed = minimal_config();
        changed.model.n_trees = 7;
        assert_ne!(a, changed.fingerprint().unwrap());
    }
}
