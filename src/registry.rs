//! Append-only model registry.
//!
//! A flat JSON array with one entry per successful training run, written
//! as the final step of training so a failed run leaves no trace. An
//! unreadable existing file degrades to a fresh list rather than blocking
//! the run.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::eval::TrainMetrics;

/// One registry entry, recorded for audit and reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub model_id: String,
    pub model_path: String,
    pub created_at_utc: String,
    pub dataset_path: String,
    pub metrics: TrainMetrics,
    /// First 12 hex chars of the SHA-256 of the training configuration.
    pub config_hash: String,
    pub features: Vec<String>,
}

/// Append one entry to the registry file, creating it if needed.
pub fn append_entry(path: &Path, entry: &RegistryEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create registry dir {}", parent.display())
            })?;
        }
    }

    let mut entries = match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str::<Vec<RegistryEntry>>(&text).unwrap_or_else(|e| {
            warn!(
                path = %path.display(),
                error = %e,
                "Registry file is unreadable; starting a fresh list"
            );
            Vec::new()
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read registry {}", path.display()))
        }
    };

    entries.push(entry.clone());
    let json = serde_json::to_string_pretty(&entries).context("failed to encode registry")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write registry {}", path.display()))?;

    info!(
        model_id = %entry.model_id,
        total = entries.len(),
        path = %path.display(),
        "Registry entry appended"
    );

    Ok(())
}

/// Read all registry entries; a missing file means no models yet.
pub fn read_entries(path: &Path) -> Result<Vec<RegistryEntry>> {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("failed to parse registry {}", path.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => {
            Err(e).with_context(|| format!("failed to read registry {}", path.display()))
        }
    }
}
