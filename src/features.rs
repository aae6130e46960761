//! Feature preparation for network-flow classification.
//!
//! Everything the model sees at training time and at serving time flows
//! through this module, so the cleaning and scaling rules here must be
//! applied identically in both places. The scaler fitted during training
//! is persisted inside the model bundle and replayed verbatim per request.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Column holding the class label in training datasets.
pub const LABEL_COLUMN: &str = "Label";

/// Per-flow identifier columns removed before training.
const DROP_COLUMNS: [&str; 6] = [
    "Flow ID",
    "Source IP",
    "Source Port",
    "Destination IP",
    "Destination Port",
    "Timestamp",
];

/// Clip range applied to every feature value before standardization.
pub const CLIP_MIN: f64 = -1e6;
pub const CLIP_MAX: f64 = 1e6;

/// A dataset as read from disk: trimmed header names plus raw string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Counters for the silent degradation points of [`clean`].
///
/// Row drops raise no error; callers that care about data loss read these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_in: usize,
    pub rows_dropped: usize,
    pub columns_removed: usize,
}

/// Load a CSV dataset, trimming whitespace from header names.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("failed to read dataset header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("failed to read dataset row")?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    debug!(
        path = %path.display(),
        rows = rows.len(),
        columns = headers.len(),
        "Dataset loaded"
    );

    Ok(Dataset { headers, rows })
}

/// Tokens treated as a missing value, matching what the upstream CSV
/// exports leave in sparse cells.
pub(crate) fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty()
        || matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "nan" | "na" | "n/a" | "null"
        )
}

/// Clean a raw dataset for training.
///
/// Removes the identifier columns when present, drops any row with a
/// missing value in a retained column (row-level drop, no imputation),
/// and trims the label value. Dropped rows are counted, not reported as
/// errors. Idempotent on already-clean input.
pub fn clean(dataset: &Dataset) -> Result<(Dataset, CleanStats)> {
    let retained: Vec<usize> = dataset
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !DROP_COLUMNS.contains(&name.as_str()))
        .map(|(i, _)| i)
        .collect();

    let headers: Vec<String> = retained
        .iter()
        .map(|&i| dataset.headers[i].clone())
        .collect();
    let Some(label_pos) = headers.iter().position(|h| h == LABEL_COLUMN) else {
        bail!("dataset has no '{LABEL_COLUMN}' column");
    };

    let mut stats = CleanStats {
        rows_in: dataset.rows.len(),
        rows_dropped: 0,
        columns_removed: dataset.headers.len() - retained.len(),
    };

    let mut rows = Vec::with_capacity(dataset.rows.len());
    for row in &dataset.rows {
        // Short rows are missing their trailing cells; treat like any
        // other missing value and drop the whole row.
        if row.len() != dataset.headers.len()
            || retained.iter().any(|&i| is_missing(&row[i]))
        {
            stats.rows_dropped += 1;
            continue;
        }
        let mut cells: Vec<String> = retained.iter().map(|&i| row[i].clone()).collect();
        cells[label_pos] = cells[label_pos].trim().to_string();
        rows.push(cells);
    }

    if stats.rows_dropped > 0 {
        debug!(
            dropped = stats.rows_dropped,
            total = stats.rows_in,
            "Dropped rows with missing values during cleaning"
        );
    }

    Ok((Dataset { headers, rows }, stats))
}

/// Partition a cleaned dataset into a numeric feature matrix, the label
/// column, and the feature-name list.
///
/// A retained non-label column counts as numeric when every one of its
/// values parses as `f64` (`inf`/`Infinity` parse and stay — they are
/// neutralized later by [`fit_scale`]). The returned name list keeps
/// first-seen column order and is the only valid schema for scoring.
pub fn select_numeric_features(
    cleaned: &Dataset,
) -> Result<(Vec<Vec<f64>>, Vec<String>, Vec<String>)> {
    let label_idx = cleaned
        .column_index(LABEL_COLUMN)
        .with_context(|| format!("cleaned dataset has no '{LABEL_COLUMN}' column"))?;

    let numeric: Vec<usize> = cleaned
        .headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != label_idx)
        .filter(|&(i, _)| {
            cleaned
                .rows
                .iter()
                .all(|row| row[i].trim().parse::<f64>().is_ok())
        })
        .map(|(i, _)| i)
        .collect();

    let feature_names: Vec<String> = numeric
        .iter()
        .map(|&i| cleaned.headers[i].clone())
        .collect();

    let mut matrix = Vec::with_capacity(cleaned.rows.len());
    let mut labels = Vec::with_capacity(cleaned.rows.len());
    for row in &cleaned.rows {
        let values: Vec<f64> = numeric
            .iter()
            .map(|&i| row[i].trim().parse::<f64>().expect("column checked numeric"))
            .collect();
        matrix.push(values);
        labels.push(row[label_idx].clone());
    }

    Ok((matrix, labels, feature_names))
}

/// Per-feature standardization statistics, fitted once at training time
/// and persisted inside the model bundle.
///
/// Must be applied to vectors in the exact per-feature order it was
/// fitted on; [`ScalerState::transform`] rejects any other size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalerState {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl ScalerState {
    /// Number of features the scaler was fitted on.
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Apply the fitted standardization to one raw feature vector.
    pub fn transform(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.means.len() {
            bail!(
                "feature vector has {} values but the scaler was fitted on {}",
                vector.len(),
                self.means.len()
            );
        }
        Ok(vector
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&mean, &std))| (v - mean) / std)
            .collect())
    }
}

/// Fit a standard scaler over a training feature matrix and return the
/// scaled matrix alongside the fitted state.
///
/// Per column: ±∞ becomes missing, missing is filled with the median of
/// the finite values, everything is clipped into `[CLIP_MIN, CLIP_MAX]`,
/// and only then are mean and standard deviation fitted. The infinity
/// replacement precedes the median so the median itself is always finite.
pub fn fit_scale(matrix: &[Vec<f64>]) -> (Vec<Vec<f64>>, ScalerState) {
    let n_cols = matrix.first().map_or(0, |row| row.len());
    let n_rows = matrix.len();

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); n_cols];
    for row in matrix {
        for (j, &v) in row.iter().enumerate() {
            columns[j].push(v);
        }
    }

    let mut means = Vec::with_capacity(n_cols);
    let mut stds = Vec::with_capacity(n_cols);
    for (j, column) in columns.iter_mut().enumerate() {
        let median = finite_median(column).unwrap_or_else(|| {
            warn!(column = j, "column has no finite values; filling with 0.0");
            0.0
        });
        for v in column.iter_mut() {
            if !v.is_finite() {
                *v = median;
            }
            *v = v.clamp(CLIP_MIN, CLIP_MAX);
        }

        let mean = column.iter().sum::<f64>() / n_rows as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
        let mut std = variance.sqrt();
        if std == 0.0 {
            // Constant column: map to 0.0 instead of dividing by zero.
            std = 1.0;
        }
        for v in column.iter_mut() {
            *v = (*v - mean) / std;
        }
        means.push(mean);
        stds.push(std);
    }

    let mut scaled = vec![Vec::with_capacity(n_cols); n_rows];
    for column in &columns {
        for (i, &v) in column.iter().enumerate() {
            scaled[i].push(v);
        }
    }

    (scaled, ScalerState { means, stds })
}

/// Median over the finite values of a column; `None` when none are finite.
fn finite_median(column: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).expect("finite values compare"));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}
