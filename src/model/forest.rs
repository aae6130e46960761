//! Random-forest classifier with per-class vote probabilities.
//!
//! smartcore's own forest type predicts labels but does not expose class
//! probabilities, and the scoring endpoint needs the maximum class
//! probability as its confidence. The forest here bags smartcore decision
//! trees over seeded bootstrap samples and reports vote shares directly.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};
use tracing::info;

type Tree = DecisionTreeClassifier<f64, usize, DenseMatrix<f64>, Vec<usize>>;

/// Forest hyperparameters, populated from the `model` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_leaf: 1,
            min_samples_split: 2,
        }
    }
}

impl ForestParams {
    fn tree_parameters(&self) -> DecisionTreeClassifierParameters {
        let mut parameters = DecisionTreeClassifierParameters::default()
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(self.min_samples_split);
        if let Some(depth) = self.max_depth {
            parameters = parameters.with_max_depth(depth);
        }
        parameters
    }
}

/// A trained forest: bagged decision trees plus the label vocabulary
/// observed at fit time (class index -> label string, first-seen order).
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Tree>,
    classes: Vec<String>,
    n_features: usize,
}

impl RandomForest {
    /// Fit a forest on a row-major feature matrix and its string labels.
    ///
    /// Deterministic for a given (matrix, labels, params, seed): bootstrap
    /// sampling draws from a seeded RNG and tree induction has no other
    /// randomness.
    pub fn fit(
        matrix: &[Vec<f64>],
        labels: &[String],
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self> {
        if matrix.is_empty() {
            bail!("cannot fit a forest on an empty training set");
        }
        if matrix.len() != labels.len() {
            bail!(
                "training set has {} rows but {} labels",
                matrix.len(),
                labels.len()
            );
        }
        let n_features = matrix[0].len();
        if n_features == 0 {
            bail!("cannot fit a forest with zero features");
        }
        if params.n_trees == 0 {
            bail!("model.n_trees must be at least 1");
        }

        let mut classes: Vec<String> = Vec::new();
        let mut encoded: Vec<usize> = Vec::with_capacity(labels.len());
        for label in labels {
            let class = match classes.iter().position(|c| c == label) {
                Some(i) => i,
                None => {
                    classes.push(label.clone());
                    classes.len() - 1
                }
            };
            encoded.push(class);
        }

        let n_rows = matrix.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let mut values = Vec::with_capacity(n_rows * n_features);
            let mut sample_labels = Vec::with_capacity(n_rows);
            for _ in 0..n_rows {
                let row = rng.gen_range(0..n_rows);
                values.extend_from_slice(&matrix[row]);
                sample_labels.push(encoded[row]);
            }
            let x = DenseMatrix::new(n_rows, n_features, values, false)
                .context("failed to build bootstrap matrix")?;
            let tree = DecisionTreeClassifier::fit(&x, &sample_labels, params.tree_parameters())
                .context("decision tree fit failed")?;
            trees.push(tree);
        }

        info!(
            trees = trees.len(),
            classes = classes.len(),
            features = n_features,
            "Forest fitted"
        );

        Ok(Self {
            trees,
            classes,
            n_features,
        })
    }

    /// Per-class probabilities for one feature vector: the fraction of
    /// trees voting for each class, in class-index order. Sums to 1.
    pub fn predict_proba(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.n_features {
            bail!(
                "feature vector has {} values but the forest was fitted on {}",
                vector.len(),
                self.n_features
            );
        }
        let x = DenseMatrix::new(1, self.n_features, vector.to_vec(), false)
            .context("failed to build prediction matrix")?;

        let mut votes = vec![0u32; self.classes.len()];
        for tree in &self.trees {
            let predicted = tree.predict(&x).context("tree prediction failed")?;
            if let Some(&class) = predicted.first() {
                if class < votes.len() {
                    votes[class] += 1;
                }
            }
        }

        let total = self.trees.len() as f64;
        Ok(votes.iter().map(|&v| v as f64 / total).collect())
    }

    /// Predicted label plus its vote share (the maximum class probability).
    pub fn predict(&self, vector: &[f64]) -> Result<(String, f64)> {
        let proba = self.predict_proba(vector)?;
        let mut best = 0;
        for (class, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = class;
            }
        }
        Ok((self.classes[best].clone(), proba[best]))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_training_set() -> (Vec<Vec<f64>>, Vec<String>) {
        let mut matrix = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            matrix.push(vec![i as f64 * 0.1, 1.0]);
            labels.push("BENIGN".to_string());
            matrix.push(vec![10.0 + i as f64 * 0.1, -1.0]);
            labels.push("DDoS".to_string());
        }
        (matrix, labels)
    }

    #[test]
    fn fit_and_predict_separable_classes() {
        let (matrix, labels) = separable_training_set();
        let forest = RandomForest::fit(&matrix, &labels, &ForestParams::default(), 42).unwrap();

        assert_eq!(forest.classes(), ["BENIGN", "DDoS"]);
        let (label, confidence) = forest.predict(&[0.5, 1.0]).unwrap();
        assert_eq!(label, "BENIGN");
        assert!(confidence > 0.5 && confidence <= 1.0);

        let (label, _) = forest.predict(&[11.0, -1.0]).unwrap();
        assert_eq!(label, "DDoS");
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (matrix, labels) = separable_training_set();
        let forest = RandomForest::fit(&matrix, &labels, &ForestParams::default(), 42).unwrap();

        let proba = forest.predict_proba(&[5.0, 0.0]).unwrap();
        assert_eq!(proba.len(), 2);
        let sum: f64 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_gives_identical_predictions() {
        let (matrix, labels) = separable_training_set();
        let params = ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(&matrix, &labels, &params, 7).unwrap();
        let b = RandomForest::fit(&matrix, &labels, &params, 7).unwrap();

        for vector in [[0.5, 1.0], [10.5, -1.0], [5.0, 0.0]] {
            assert_eq!(
                a.predict_proba(&vector).unwrap(),
                b.predict_proba(&vector).unwrap()
            );
        }
    }

    #[test]
    fn rejects_wrong_dimension() {
        let (matrix, labels) = separable_training_set();
        let forest = RandomForest::fit(&matrix, &labels, &ForestParams::default(), 42).unwrap();
        assert!(forest.predict(&[1.0]).is_err());
        assert!(forest.predict(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(RandomForest::fit(&[], &[], &ForestParams::default(), 42).is_err());
        let params = ForestParams {
            n_trees: 0,
            ..ForestParams::default()
        };
        assert!(
            RandomForest::fit(&[vec![1.0]], &["a".to_string()], &params, 42).is_err()
        );
    }
}
