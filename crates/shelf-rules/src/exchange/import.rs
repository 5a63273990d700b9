//! Rule document import.
//!
//! Per-rule problems never fail the whole import. Every entry is
//! resolved independently and the outcome lands in the report, so one
//! stale reference in a shared document does not block the rest.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shelf_core::VersionExpression;

use super::{ExchangeError, ImportMode, RuleDocument, RuleEntry, EXCHANGE_FORMAT_VERSION};
use crate::registry::Registry;
use crate::rule::{Rule, RuleCategory};
use crate::ruleset::RuleSet;

/// Applies rule documents to a live rule set.
pub struct RuleImporter;

/// One rule entry that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub rule: String,
    pub reason: String,
}

/// Per-rule outcome of an import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    /// Rules added to the target rule set.
    pub imported: Vec<String>,
    /// Rules skipped because their name already exists (merge mode).
    pub skipped: Vec<String>,
    /// Rules that could not be resolved against the local registry.
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    /// True when every entry in the document was imported.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl RuleImporter {
    /// Imports a document into `rule_set`, resolving references against
    /// `registry`. Only document-level problems (bad format version,
    /// malformed settings) fail the call; unresolved rules land in the
    /// report's `failed` list and the rest proceed.
    pub fn import(
        document: &RuleDocument,
        rule_set: &mut RuleSet,
        registry: &Registry,
        mode: ImportMode,
    ) -> Result<ImportReport, ExchangeError> {
        if document.format_version != EXCHANGE_FORMAT_VERSION {
            return Err(ExchangeError::UnsupportedVersion(
                document.format_version.clone(),
            ));
        }

        if mode == ImportMode::Replace {
            let range = match &document.settings.version_range {
                Some(raw) => Some(VersionExpression::parse(raw).map_err(|source| {
                    ExchangeError::InvalidRange {
                        range: raw.clone(),
                        source,
                    }
                })?),
                None => None,
            };
            rule_set.clear_rules();
            rule_set.description = document.description.clone();
            rule_set.version_range_filter = range;
            rule_set.exclude_unversioned = document.settings.exclude_unversioned;
        }

        let mut report = ImportReport::default();
        let lists = [
            (RuleCategory::Address, &document.address_rules),
            (RuleCategory::Label, &document.label_rules),
            (RuleCategory::Version, &document.version_rules),
        ];
        for (category, entries) in lists {
            for entry in entries {
                if rule_set.contains_rule(category, &entry.name) {
                    match mode {
                        ImportMode::Merge => {
                            debug!(rule = %entry.name, "skipping rule, name already present");
                            report.skipped.push(entry.name.clone());
                        }
                        // After the replace-mode clear, a collision can
                        // only come from the document itself.
                        ImportMode::Replace => {
                            report.failed.push(ImportFailure {
                                rule: entry.name.clone(),
                                reason: format!(
                                    "duplicate rule name '{}' in the document's {category} list",
                                    entry.name
                                ),
                            });
                        }
                    }
                    continue;
                }

                match Self::resolve_entry(entry, category, registry) {
                    Ok(rule) => {
                        rule_set.add_rule(rule);
                        report.imported.push(entry.name.clone());
                    }
                    Err(reason) => {
                        warn!(rule = %entry.name, %reason, "rule entry could not be imported");
                        report.failed.push(ImportFailure {
                            rule: entry.name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    /// Dry run: reports what an import would do without touching the
    /// target rule set.
    pub fn validate(
        document: &RuleDocument,
        rule_set: &RuleSet,
        registry: &Registry,
        mode: ImportMode,
    ) -> Result<ImportReport, ExchangeError> {
        let mut scratch = rule_set.clone();
        Self::import(document, &mut scratch, registry, mode)
    }

    fn resolve_entry(
        entry: &RuleEntry,
        category: RuleCategory,
        registry: &Registry,
    ) -> Result<Rule, String> {
        let policy_category = entry.policy.category();
        if policy_category != category {
            return Err(format!(
                "policy is {policy_category} but the entry sits in the {category} list"
            ));
        }
        if entry.filters.is_empty() {
            return Err("entry has no filter references".to_string());
        }

        let mut filters = Vec::with_capacity(entry.filters.len());
        for reference in &entry.filters {
            let filter = registry
                .filter(&reference.filter_reference)
                .ok_or_else(|| format!("unknown filter '{}'", reference.filter_reference))?;
            let local_type = filter.kind.type_name();
            if local_type != reference.filter_type {
                return Err(format!(
                    "filter '{}' is {} locally but the document expects {}",
                    reference.filter_reference, local_type, reference.filter_type
                ));
            }
            filters.push(reference.filter_reference.clone());
        }

        let provider_name = &entry.provider.provider_reference;
        let provider = registry
            .provider(provider_name)
            .ok_or_else(|| format!("unknown provider '{provider_name}'"))?;
        let local_type = provider.kind.type_name();
        if local_type != entry.provider.provider_type {
            return Err(format!(
                "provider '{provider_name}' is {local_type} locally but the document expects {}",
                entry.provider.provider_type
            ));
        }
        if provider.kind.category() != category {
            return Err(format!(
                "provider '{provider_name}' yields {} output, not {category}",
                provider.kind.category()
            ));
        }

        Ok(Rule {
            name: entry.name.clone(),
            description: entry.description.clone(),
            enabled: entry.enabled,
            priority: entry.priority,
            filters,
            provider: provider_name.clone(),
            policy: entry.policy.clone(),
        })
    }
}
