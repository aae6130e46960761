//! End-to-end training runs.
//!
//! A run is strictly sequential: clean → select numeric features → fit
//! scaler → split → fit forest → evaluate → persist bundle → run record →
//! registry entry. Any failure aborts the run before the registry write,
//! so a failed run leaves no bundle and no registry entry.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AppConfig, ModelConfig};
use crate::eval::{evaluate, Evaluation};
use crate::features;
use crate::model::bundle::ModelBundle;
use crate::model::forest::{ForestParams, RandomForest};
use crate::registry::{self, RegistryEntry};

/// Result of a successful training run.
pub struct TrainOutcome {
    pub model_id: String,
    pub model_path: PathBuf,
    pub registry_path: PathBuf,
    pub run_record: Option<PathBuf>,
    pub evaluation: Evaluation,
}

/// Train, evaluate, and persist a model according to the configuration.
pub fn train_from_config(
    config: &AppConfig,
    run_name_override: Option<&str>,
) -> Result<TrainOutcome> {
    let dataset_path = &config.dataset.path;
    let dataset = features::load_dataset(dataset_path)?;
    let (cleaned, stats) = features::clean(&dataset)?;
    info!(
        rows = cleaned.row_count(),
        dropped = stats.rows_dropped,
        columns_removed = stats.columns_removed,
        "Dataset cleaned"
    );

    let (matrix, labels, feature_names) = features::select_numeric_features(&cleaned)?;
    if matrix.is_empty() {
        bail!("no rows left after cleaning {dataset_path}");
    }
    if feature_names.is_empty() {
        bail!("no numeric feature columns found in {dataset_path}");
    }
    info!(features = feature_names.len(), "Numeric features selected");

    let (scaled, scaler) = features::fit_scale(&matrix);

    let (train_idx, test_idx) = split_indices(
        &labels,
        config.split.test_size,
        config.split.stratify,
        config.random_state,
    )?;
    info!(
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        stratify = config.split.stratify,
        "Dataset split"
    );

    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| scaled[i].clone()).collect();
    let y_train: Vec<String> = train_idx.iter().map(|&i| labels[i].clone()).collect();
    let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| scaled[i].clone()).collect();
    let y_test: Vec<String> = test_idx.iter().map(|&i| labels[i].clone()).collect();

    let params = forest_params(&config.model);
    let forest = RandomForest::fit(&x_train, &y_train, &params, config.random_state)?;

    let predicted = x_test
        .iter()
        .map(|row| forest.predict(row).map(|(label, _)| label))
        .collect::<Result<Vec<String>>>()?;
    let evaluation = evaluate(&y_test, &predicted);
    info!(
        accuracy = evaluation.metrics.accuracy,
        macro_f1 = evaluation.metrics.macro_f1,
        "Held-out evaluation complete"
    );

    let trained_at = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let bundle = ModelBundle {
        forest,
        scaler,
        feature_names: feature_names.clone(),
        trained_at,
    };
    let (model_path, _current) = bundle.save(Path::new(&config.output.dir))?;

    let run_record = if config.tracking.enabled {
        Some(write_run_record(
            config,
            run_name_override,
            &bundle,
            &evaluation,
            &model_path,
        )?)
    } else {
        None
    };

    let registry_path = config.registry_path();
    let entry = RegistryEntry {
        model_id: bundle.model_id(),
        model_path: model_path.display().to_string(),
        created_at_utc: bundle.trained_at.clone(),
        dataset_path: dataset_path.clone(),
        metrics: evaluation.metrics.clone(),
        config_hash: config.fingerprint()?,
        features: feature_names,
    };
    registry::append_entry(&registry_path, &entry)?;

    Ok(TrainOutcome {
        model_id: bundle.model_id(),
        model_path,
        registry_path,
        run_record,
        evaluation,
    })
}

fn forest_params(model: &ModelConfig) -> ForestParams {
    ForestParams {
        n_trees: model.n_trees,
        max_depth: model.max_depth,
        min_samples_leaf: model.min_samples_leaf,
        min_samples_split: model.min_samples_split,
    }
}

/// Seeded train/test index split, optionally stratified by label.
fn split_indices(
    labels: &[String],
    test_size: f64,
    stratify: bool,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        bail!("split.test_size must be in (0, 1), got {test_size}");
    }
    let n = labels.len();
    if n < 2 {
        bail!("need at least 2 rows to split, got {n}");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    if stratify {
        let mut groups: Vec<(&String, Vec<usize>)> = Vec::new();
        for (i, label) in labels.iter().enumerate() {
            match groups.iter_mut().find(|(l, _)| *l == label) {
                Some((_, indices)) => indices.push(i),
                None => groups.push((label, vec![i])),
            }
        }
        for (_, mut indices) in groups {
            indices.shuffle(&mut rng);
            let mut n_test = (indices.len() as f64 * test_size).round() as usize;
            // Every label keeps at least one training row.
            if n_test >= indices.len() {
                n_test = indices.len() - 1;
            }
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let mut n_test = (n as f64 * test_size).round() as usize;
        if n_test >= n {
            n_test = n - 1;
        }
        test = indices[..n_test].to_vec();
        train = indices[n_test..].to_vec();
    }

    if test.is_empty() {
        // Tiny datasets can round every per-label share to zero; hold out
        // one row so evaluation still has something to measure.
        warn!("test partition rounded to zero rows; holding out one training row");
        if let Some(moved) = train.pop() {
            test.push(moved);
        }
    }
    if train.is_empty() {
        bail!("degenerate split: empty training partition");
    }

    Ok((train, test))
}

#[derive(Serialize)]
struct RunRecord<'a> {
    run_name: &'a str,
    model_id: String,
    dataset_path: &'a str,
    test_size: f64,
    stratify: bool,
    random_state: u64,
    model: &'a ModelConfig,
    evaluation: &'a Evaluation,
    artifact: String,
}

/// Write the experiment run record for a finished training run.
fn write_run_record(
    config: &AppConfig,
    run_name_override: Option<&str>,
    bundle: &ModelBundle,
    evaluation: &Evaluation,
    model_path: &Path,
) -> Result<PathBuf> {
    let default_name = format!("run-{}", bundle.trained_at);
    let run_name = run_name_override
        .or(config.tracking.run_name.as_deref())
        .unwrap_or(&default_name);

    let record = RunRecord {
        run_name,
        model_id: bundle.model_id(),
        dataset_path: &config.dataset.path,
        test_size: config.split.test_size,
        stratify: config.split.stratify,
        random_state: config.random_state,
        model: &config.model,
        evaluation,
        artifact: model_path.display().to_string(),
    };

    let dir = Path::new(&config.tracking.dir);
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create tracking dir {}", dir.display()))?;
    let path = dir.join(format!("{run_name}.json"));
    let json = serde_json::to_string_pretty(&record).context("failed to encode run record")?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write run record {}", path.display()))?;

    info!(run_name, path = %path.display(), "Run record written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatasetConfig, MonitorConfig, OutputConfig, ServerConfig, SplitConfig, TrackingConfig,
    };
    use crate::model::scorer::Scorer;
    use std::collections::HashMap;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn test_config(dir: &Path, dataset: &Path) -> AppConfig {
        AppConfig {
            dataset: DatasetConfig {
                path: dataset.display().to_string(),
            },
            split: SplitConfig::default(),
            random_state: 42,
            model: ModelConfig {
                n_trees: 10,
                ..ModelConfig::default()
            },
            output: OutputConfig {
                dir: dir.join("models").display().to_string(),
                registry_path: None,
            },
            tracking: TrackingConfig {
                enabled: true,
                run_name: None,
                dir: dir.join("runs").display().to_string(),
            },
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }

    #[test]
    fn stratified_split_preserves_label_proportions() {
        let mut y = Vec::new();
        y.extend(labels(&["BENIGN"; 50]));
        y.extend(labels(&["DDoS"; 50]));

        let (train, test) = split_indices(&y, 0.2, true, 42).unwrap();
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);

        let test_benign = test.iter().filter(|&&i| y[i] == "BENIGN").count();
        assert_eq!(test_benign, 10);
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let y = labels(&["a", "b", "a", "b", "a", "b", "a", "b", "a", "b"]);
        let first = split_indices(&y, 0.3, true, 7).unwrap();
        let second = split_indices(&y, 0.3, true, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn split_rejects_bad_test_size() {
        let y = labels(&["a", "b"]);
        assert!(split_indices(&y, 0.0, false, 42).is_err());
        assert!(split_indices(&y, 1.0, false, 42).is_err());
    }

    #[test]
    fn end_to_end_tiny_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("flows.csv");
        fs::write(&dataset, "a,b,Label\n1,10,BENIGN\n2,20,DDoS\n3,30,DDoS\n").unwrap();

        let config = test_config(dir.path(), &dataset);
        let outcome = train_from_config(&config, Some("test-run")).unwrap();

        assert!(outcome.model_id.starts_with("rf-"));
        assert!(outcome.model_path.exists());
        assert!(outcome.run_record.as_ref().unwrap().exists());

        let entries = registry::read_entries(&outcome.registry_path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].features, vec!["a", "b"]);
        assert_eq!(entries[0].config_hash.len(), 12);

        // The persisted current bundle is usable for scoring as-is.
        let bundle = ModelBundle::load(config.bundle_path()).unwrap();
        assert_eq!(bundle.feature_names, vec!["a", "b"]);
        let scorer = Scorer::new(bundle);

        let mut features = HashMap::new();
        features.insert("a".to_string(), 2.0);
        features.insert("b".to_string(), 20.0);
        let scored = scorer.score(&features).unwrap();
        assert!(["BENIGN", "DDoS"].contains(&scored.prediction.prediction.as_str()));
        assert!((0.0..=1.0).contains(&scored.prediction.confidence));

        // An empty feature mapping must not raise an error.
        assert!(scorer.score(&HashMap::new()).is_ok());
    }

    #[test]
    fn missing_dataset_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &dir.path().join("absent.csv"));
        assert!(train_from_config(&config, None).is_err());
        // No partial output: failed runs write no registry.
        assert!(registry::read_entries(&config.registry_path())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_label_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("flows.csv");
        fs::write(&dataset, "a,b\n1,10\n2,20\n").unwrap();

        let config = test_config(dir.path(), &dataset);
        assert!(train_from_config(&config, None).is_err());
    }

    #[test]
    fn tracking_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("flows.csv");
        let rows: String = (0..20)
            .map(|i| {
                let label = if i % 2 == 0 { "BENIGN" } else { "DDoS" };
                format!("{},{},{label}\n", i, i * 10)
            })
            .collect();
        fs::write(&dataset, format!("a,b,Label\n{rows}")).unwrap();

        let mut config = test_config(dir.path(), &dataset);
        config.tracking.enabled = false;

        let outcome = train_from_config(&config, None).unwrap();
        assert!(outcome.run_record.is_none());
        assert!(!Path::new(&config.tracking.dir).exists());
    }
}
