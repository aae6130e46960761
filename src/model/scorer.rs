//! Serving-time scoring against a loaded model bundle.

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::model::bundle::ModelBundle;
use crate::types::Prediction;

/// One scored request plus its degradation counter.
pub struct Scored {
    pub prediction: Prediction,
    /// Feature names from the bundle that were absent in the request and
    /// substituted with 0.0.
    pub defaulted: usize,
}

/// Stateless scorer around an immutable model bundle.
///
/// Constructed once at process start; afterwards only read, so it can be
/// shared across server workers behind an `Arc`.
pub struct Scorer {
    bundle: ModelBundle,
}

impl Scorer {
    pub fn new(bundle: ModelBundle) -> Self {
        Self { bundle }
    }

    pub fn model_id(&self) -> String {
        self.bundle.model_id()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.bundle.feature_names
    }

    /// Score one flow's feature mapping.
    ///
    /// The vector is rebuilt in the bundle's fitted feature order; names
    /// absent from the request default to 0.0 and names the bundle never
    /// saw are ignored. Missing names are counted, not rejected — clients
    /// sending a mismatched schema get a best-effort answer plus a debug
    /// trace, never an error.
    pub fn score(&self, features: &HashMap<String, f64>) -> Result<Scored> {
        let mut defaulted = 0;
        let vector: Vec<f64> = self
            .bundle
            .feature_names
            .iter()
            .map(|name| match features.get(name) {
                Some(&value) => value,
                None => {
                    defaulted += 1;
                    0.0
                }
            })
            .collect();

        let scaled = self.bundle.scaler.transform(&vector)?;
        let (label, confidence) = self.bundle.forest.predict(&scaled)?;

        if defaulted > 0 {
            debug!(
                defaulted,
                known = self.bundle.feature_names.len(),
                "Request was missing known feature names; defaulted to 0.0"
            );
        }

        Ok(Scored {
            prediction: Prediction {
                prediction: label,
                confidence: round4(confidence),
            },
            defaulted,
        })
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fit_scale;
    use crate::model::bundle::ModelBundle;
    use crate::model::forest::{ForestParams, RandomForest};

    fn test_scorer() -> Scorer {
        let matrix = vec![
            vec![1.0, 10.0],
            vec![2.0, 20.0],
            vec![3.0, 30.0],
            vec![4.0, 40.0],
        ];
        let labels = vec![
            "BENIGN".to_string(),
            "BENIGN".to_string(),
            "DDoS".to_string(),
            "DDoS".to_string(),
        ];
        let (scaled, scaler) = fit_scale(&matrix);
        let params = ForestParams {
            n_trees: 25,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&scaled, &labels, &params, 42).unwrap();
        Scorer::new(ModelBundle {
            forest,
            scaler,
            feature_names: vec!["a".to_string(), "b".to_string()],
            trained_at: "20260101-000000".to_string(),
        })
    }

    fn features(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = test_scorer();
        let request = features(&[("a", 2.0), ("b", 20.0)]);

        let first = scorer.score(&request).unwrap().prediction;
        let second = scorer.score(&request).unwrap().prediction;
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first.confidence));
    }

    #[test]
    fn missing_feature_defaults_to_zero() {
        let scorer = test_scorer();

        let implicit = scorer.score(&features(&[("a", 2.0)])).unwrap();
        let explicit = scorer
            .score(&features(&[("a", 2.0), ("b", 0.0)]))
            .unwrap();

        assert_eq!(implicit.prediction, explicit.prediction);
        assert_eq!(implicit.defaulted, 1);
        assert_eq!(explicit.defaulted, 0);
    }

    #[test]
    fn empty_request_scores_without_error() {
        let scorer = test_scorer();
        let scored = scorer.score(&HashMap::new()).unwrap();

        assert_eq!(scored.defaulted, 2);
        assert!((0.0..=1.0).contains(&scored.prediction.confidence));
    }

    #[test]
    fn unknown_feature_names_are_ignored() {
        let scorer = test_scorer();

        let with_extra = scorer
            .score(&features(&[("a", 2.0), ("b", 20.0), ("bogus", 99.0)]))
            .unwrap();
        let without = scorer
            .score(&features(&[("a", 2.0), ("b", 20.0)]))
            .unwrap();

        assert_eq!(with_extra.prediction, without.prediction);
    }

    #[test]
    fn confidence_is_rounded_to_four_decimals() {
        let scorer = test_scorer();
        let scored = scorer.score(&features(&[("a", 2.5), ("b", 25.0)])).unwrap();

        let rescaled = scored.prediction.confidence * 10_000.0;
        assert!((rescaled - rescaled.round()).abs() < 1e-9);
    }
}
