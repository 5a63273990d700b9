//! Run reports.
//!
//! A report bundles one run's outcome with its conflict scan into a
//! single JSON artifact for CI and for later inspection.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shelf_core::{Conflict, ResolvedAsset};

use crate::resolver::{GenerationWarning, ProcessResult, RunStats, RunStatus};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable record of one resolution run plus its conflict scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub status: RunStatus,
    pub stats: RunStats,
    pub warnings: Vec<GenerationWarning>,
    pub conflicts: Vec<Conflict>,
    pub assets: Vec<ResolvedAsset>,
}

impl RunReport {
    pub fn new(result: &ProcessResult, conflicts: Vec<Conflict>) -> Self {
        Self {
            generated_at: Utc::now(),
            status: result.status,
            stats: result.stats,
            warnings: result.warnings.clone(),
            conflicts,
            assets: result.resolved.clone(),
        }
    }

    /// Number of error-severity conflicts in the report.
    pub fn error_conflicts(&self) -> usize {
        self.conflicts.iter().filter(|c| c.is_error()).count()
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::{ConflictKind, ResolvedAsset};

    fn sample_result() -> ProcessResult {
        let mut asset = ResolvedAsset::carry_over("a.png", None);
        asset.address = Some("a".to_string());
        ProcessResult {
            status: RunStatus::Completed,
            resolved: vec![asset],
            warnings: vec![],
            stats: RunStats {
                assets_total: 1,
                assets_processed: 1,
                addresses_assigned: 1,
                ..RunStats::default()
            },
        }
    }

    #[test]
    fn test_report_round_trip() {
        let conflicts = vec![Conflict::new(
            ConflictKind::DuplicateAddress,
            "address 'a' is assigned to 2 assets",
            vec!["a.png".to_string(), "b.png".to_string()],
            "narrow the filters",
        )];
        let report = RunReport::new(&sample_result(), conflicts);
        assert_eq!(report.error_conflicts(), 1);

        let json = report.to_json().unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, RunStatus::Completed);
        assert_eq!(parsed.stats.addresses_assigned, 1);
        assert_eq!(parsed.conflicts.len(), 1);
        assert_eq!(parsed.assets[0].address.as_deref(), Some("a"));
    }

    #[test]
    fn test_write_file() {
        let report = RunReport::new(&sample_result(), vec![]);
        let file = tempfile::NamedTempFile::new().unwrap();
        report.write_file(file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("\"assets_processed\": 1"));
    }
}
