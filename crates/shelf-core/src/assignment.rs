//! Current assignments and resolution output.
//!
//! The engine never edits stored assignments in place. The host hands it an
//! immutable [`AssignmentSnapshot`] of whatever is currently assigned, the
//! run produces fresh [`ResolvedAsset`] values, and the host decides what to
//! commit. [`AssignmentSnapshot::absorb`] rebuilds a snapshot from a run's
//! output so the next run sees it as current state.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Metadata currently assigned to one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl AssignedEntry {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.labels.is_empty()
            && self.version.is_none()
            && self.group.is_none()
    }
}

/// Read-only view of the host's current assignments, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSnapshot {
    entries: HashMap<String, AssignedEntry>,
}

impl AssignmentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: AssignedEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&AssignedEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds a snapshot from a finished run. Excluded assets keep their
    /// assignments; exclusion narrows the output inventory, it does not
    /// erase state. Assets that ended the run with nothing assigned are
    /// left out.
    pub fn absorb(resolved: &[ResolvedAsset]) -> Self {
        let mut snapshot = Self::new();
        for asset in resolved {
            let entry = AssignedEntry {
                address: asset.address.clone(),
                labels: asset.labels.clone(),
                version: asset.version.clone(),
                group: asset.group.clone(),
            };
            if !entry.is_empty() {
                snapshot.insert(asset.path.clone(), entry);
            }
        }
        snapshot
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Resolution outcome for one asset, rebuilt from scratch every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAsset {
    pub path: String,
    pub address: Option<String>,
    pub labels: BTreeSet<String>,
    pub version: Option<String>,
    pub group: Option<String>,
    /// Set when the ruleset excludes unversioned assets and this asset
    /// ended the run without a version.
    pub excluded: bool,
}

impl ResolvedAsset {
    /// Seeds the outcome with the asset's current assignments. Rules then
    /// overwrite or extend what they match; anything untouched carries
    /// over as-is.
    pub fn carry_over(path: impl Into<String>, current: Option<&AssignedEntry>) -> Self {
        match current {
            Some(entry) => Self {
                path: path.into(),
                address: entry.address.clone(),
                labels: entry.labels.clone(),
                version: entry.version.clone(),
                group: entry.group.clone(),
                excluded: false,
            },
            None => Self {
                path: path.into(),
                address: None,
                labels: BTreeSet::new(),
                version: None,
                group: None,
                excluded: false,
            },
        }
    }
}
