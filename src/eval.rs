//! Held-out evaluation: accuracy, macro-averaged metrics, confusion matrix.

use serde::{Deserialize, Serialize};

/// Headline metrics persisted to the model registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainMetrics {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
}

/// Per-class breakdown, written into the experiment run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassReport {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Full evaluation of a held-out partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub metrics: TrainMetrics,
    pub per_class: Vec<ClassReport>,
    /// Class order of the confusion matrix rows/columns.
    pub classes: Vec<String>,
    /// `confusion[i][j]`: rows actual, columns predicted.
    pub confusion: Vec<Vec<u64>>,
}

/// Evaluate predictions against the held-out labels.
///
/// Class order is first-seen across actual then predicted labels.
/// Undefined ratios (zero denominators) score 0 rather than erroring.
pub fn evaluate(actual: &[String], predicted: &[String]) -> Evaluation {
    debug_assert_eq!(actual.len(), predicted.len());

    let mut classes: Vec<String> = Vec::new();
    for label in actual.iter().chain(predicted) {
        if !classes.contains(label) {
            classes.push(label.clone());
        }
    }

    let index = |label: &String| classes.iter().position(|c| c == label).expect("collected");
    let n = classes.len();
    let mut confusion = vec![vec![0u64; n]; n];
    for (a, p) in actual.iter().zip(predicted) {
        confusion[index(a)][index(p)] += 1;
    }

    let total: u64 = actual.len() as u64;
    let correct: u64 = (0..n).map(|i| confusion[i][i]).sum();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };

    let mut per_class = Vec::with_capacity(n);
    for i in 0..n {
        let tp = confusion[i][i];
        let predicted_i: u64 = (0..n).map(|j| confusion[j][i]).sum();
        let actual_i: u64 = confusion[i].iter().sum();

        let precision = ratio(tp, predicted_i);
        let recall = ratio(tp, actual_i);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        per_class.push(ClassReport {
            class: classes[i].clone(),
            precision,
            recall,
            f1,
            support: actual_i,
        });
    }

    let macro_avg = |f: fn(&ClassReport) -> f64| {
        if per_class.is_empty() {
            0.0
        } else {
            per_class.iter().map(f).sum::<f64>() / per_class.len() as f64
        }
    };

    Evaluation {
        metrics: TrainMetrics {
            accuracy,
            macro_precision: macro_avg(|c| c.precision),
            macro_recall: macro_avg(|c| c.recall),
            macro_f1: macro_avg(|c| c.f1),
        },
        per_class,
        classes,
        confusion,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
