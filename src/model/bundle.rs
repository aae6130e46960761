//! Persisted model bundles.
//!
//! A training run produces one immutable bundle: the fitted forest, the
//! fitted scaler, the ordered feature-name list, and the training
//! timestamp. The bundle is written twice — once under its versioned id
//! and once as the well-known current file the scoring endpoint loads at
//! startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::ScalerState;
use crate::model::forest::RandomForest;

/// File name of the bundle the scoring endpoint consumes.
pub const CURRENT_BUNDLE: &str = "current.bin";

#[derive(Serialize, Deserialize)]
pub struct ModelBundle {
    pub forest: RandomForest,
    pub scaler: ScalerState,
    pub feature_names: Vec<String>,
    /// UTC training timestamp, `YYYYmmdd-HHMMSS`.
    pub trained_at: String,
}

impl ModelBundle {
    pub fn model_id(&self) -> String {
        format!("rf-{}", self.trained_at)
    }

    /// Write the versioned bundle and overwrite the current one.
    ///
    /// Returns the (versioned, current) paths.
    pub fn save(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;

        let encoded = bincode::serialize(self).context("failed to encode model bundle")?;

        let versioned = dir.join(format!("{}.bin", self.model_id()));
        fs::write(&versioned, &encoded)
            .with_context(|| format!("failed to write {}", versioned.display()))?;

        let current = dir.join(CURRENT_BUNDLE);
        fs::write(&current, &encoded)
            .with_context(|| format!("failed to write {}", current.display()))?;

        info!(
            model_id = %self.model_id(),
            path = %versioned.display(),
            size_bytes = encoded.len(),
            "Model bundle saved"
        );

        Ok((versioned, current))
    }

    /// Load a bundle from disk. Called once per serving process.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read model bundle {}", path.display()))?;
        let bundle: Self =
            bincode::deserialize(&bytes).context("failed to decode model bundle")?;

        info!(
            model_id = %bundle.model_id(),
            features = bundle.feature_names.len(),
            classes = bundle.forest.classes().len(),
            "Model bundle loaded"
        );

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fit_scale;
    use crate::model::forest::ForestParams;

    fn tiny_bundle() -> ModelBundle {
        let matrix = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let labels = vec!["BENIGN".to_string(), "DDoS".to_string(), "DDoS".to_string()];
        let (scaled, scaler) = fit_scale(&matrix);
        let params = ForestParams {
            n_trees: 10,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&scaled, &labels, &params, 42).unwrap();
        ModelBundle {
            forest,
            scaler,
            feature_names: vec!["a".to_string(), "b".to_string()],
            trained_at: "20260101-000000".to_string(),
        }
    }

    #[test]
    fn model_id_uses_rf_prefix() {
        assert_eq!(tiny_bundle().model_id(), "rf-20260101-000000");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = tiny_bundle();
        let probe = bundle.scaler.transform(&[2.0, 20.0]).unwrap();
        let expected = bundle.forest.predict(&probe).unwrap();

        let (versioned, current) = bundle.save(dir.path()).unwrap();
        assert!(versioned.ends_with("rf-20260101-000000.bin"));
        assert!(current.ends_with(CURRENT_BUNDLE));

        let loaded = ModelBundle::load(&current).unwrap();
        assert_eq!(loaded.feature_names, bundle.feature_names);
        assert_eq!(loaded.trained_at, bundle.trained_at);
        let probe = loaded.scaler.transform(&[2.0, 20.0]).unwrap();
        assert_eq!(loaded.forest.predict(&probe).unwrap(), expected);
    }

    #[test]
    fn load_missing_bundle_fails() {
        assert!(ModelBundle::load("does/not/exist.bin").is_err());
    }
}
