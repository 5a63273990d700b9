//! Portable rule documents.
//!
//! A rule document carries one rule set between Shelfmark instances. It
//! records filters and providers by reference, not by value: the
//! receiving side resolves each reference against its own registry, so
//! a shared document never overwrites locally tuned definitions.

pub mod export;
pub mod import;

pub use export::RuleExporter;
pub use import::{ImportFailure, ImportReport, RuleImporter};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rule::RulePolicy;

/// Format version written into exported documents. Import rejects
/// anything else.
pub const EXCHANGE_FORMAT_VERSION: &str = "1.0";

/// A portable rule document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Document format version.
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the document was produced.
    pub exported_at: DateTime<Utc>,
    /// Global settings of the exported rule set.
    #[serde(default)]
    pub settings: DocumentSettings,
    #[serde(default)]
    pub address_rules: Vec<RuleEntry>,
    #[serde(default)]
    pub label_rules: Vec<RuleEntry>,
    #[serde(default)]
    pub version_rules: Vec<RuleEntry>,
}

impl RuleDocument {
    /// Total number of rule entries across all three lists.
    pub fn rule_count(&self) -> usize {
        self.address_rules.len() + self.label_rules.len() + self.version_rules.len()
    }
}

/// Rule-set level settings carried alongside the rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,
    #[serde(default)]
    pub exclude_unversioned: bool,
}

/// One rule as it appears in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub priority: i32,
    pub policy: RulePolicy,
    /// Ordered filter references; all must match for the rule to apply.
    pub filters: Vec<FilterRef>,
    pub provider: ProviderRef,
}

/// Reference to a filter by registry name, with the kind recorded so
/// the receiving side can detect a name that now means something else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRef {
    pub filter_type: String,
    pub filter_reference: String,
}

/// Reference to a provider by registry name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub provider_type: String,
    pub provider_reference: String,
}

/// How to treat the target rule set during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Clear the target rule set and adopt the document's settings.
    Replace,
    /// Keep existing rules and settings; skip incoming rules whose
    /// names collide with existing ones.
    Merge,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::Merge => write!(f, "merge"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(ImportMode::Replace),
            "merge" => Ok(ImportMode::Merge),
            other => Err(format!("unknown import mode '{other}' (expected 'replace' or 'merge')")),
        }
    }
}

/// Errors that fail an exchange operation outright. Per-rule problems
/// during import are reported in the [`ImportReport`] instead.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to serialize rule document: {0}")]
    Serialize(String),
    #[error("failed to parse rule document: {0}")]
    Parse(String),
    #[error("unsupported document format version '{0}' (expected '{EXCHANGE_FORMAT_VERSION}')")]
    UnsupportedVersion(String),
    #[error("document version range '{range}' is invalid: {source}")]
    InvalidRange {
        range: String,
        source: shelf_core::RangeError,
    },
    #[error("rule '{rule}' references unknown filter '{name}'")]
    UnknownFilter { rule: String, name: String },
    #[error("rule '{rule}' references unknown provider '{name}'")]
    UnknownProvider { rule: String, name: String },
}
