//! Rule document export.

use chrono::Utc;

use super::{
    DocumentSettings, ExchangeError, FilterRef, ProviderRef, RuleDocument, RuleEntry,
    EXCHANGE_FORMAT_VERSION,
};
use crate::registry::Registry;
use crate::rule::{Rule, RuleCategory};
use crate::ruleset::RuleSet;

/// Produces portable rule documents from a live rule set.
pub struct RuleExporter;

impl RuleExporter {
    /// Exports a rule set as a document. Every filter and provider a
    /// rule references must exist in the registry so its kind can be
    /// recorded; an unresolved reference fails the export.
    pub fn export(rule_set: &RuleSet, registry: &Registry) -> Result<RuleDocument, ExchangeError> {
        Ok(RuleDocument {
            format_version: EXCHANGE_FORMAT_VERSION.to_string(),
            description: rule_set.description.clone(),
            exported_at: Utc::now(),
            settings: DocumentSettings {
                version_range: rule_set
                    .version_range_filter
                    .as_ref()
                    .map(ToString::to_string),
                exclude_unversioned: rule_set.exclude_unversioned,
            },
            address_rules: Self::export_rules(rule_set.rules(RuleCategory::Address), registry)?,
            label_rules: Self::export_rules(rule_set.rules(RuleCategory::Label), registry)?,
            version_rules: Self::export_rules(rule_set.rules(RuleCategory::Version), registry)?,
        })
    }

    fn export_rules(rules: &[Rule], registry: &Registry) -> Result<Vec<RuleEntry>, ExchangeError> {
        rules
            .iter()
            .map(|rule| Self::export_rule(rule, registry))
            .collect()
    }

    fn export_rule(rule: &Rule, registry: &Registry) -> Result<RuleEntry, ExchangeError> {
        let filters = rule
            .filters
            .iter()
            .map(|name| {
                let filter = registry
                    .filter(name)
                    .ok_or_else(|| ExchangeError::UnknownFilter {
                        rule: rule.name.clone(),
                        name: name.clone(),
                    })?;
                Ok(FilterRef {
                    filter_type: filter.kind.type_name().to_string(),
                    filter_reference: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, ExchangeError>>()?;

        let provider =
            registry
                .provider(&rule.provider)
                .ok_or_else(|| ExchangeError::UnknownProvider {
                    rule: rule.name.clone(),
                    name: rule.provider.clone(),
                })?;

        Ok(RuleEntry {
            name: rule.name.clone(),
            description: rule.description.clone(),
            enabled: rule.enabled,
            priority: rule.priority,
            policy: rule.policy.clone(),
            filters,
            provider: ProviderRef {
                provider_type: provider.kind.type_name().to_string(),
                provider_reference: rule.provider.clone(),
            },
        })
    }

    /// Serializes a document to pretty-printed JSON.
    pub fn to_json(document: &RuleDocument) -> Result<String, ExchangeError> {
        serde_json::to_string_pretty(document).map_err(|e| ExchangeError::Serialize(e.to_string()))
    }

    /// Parses a document from JSON.
    pub fn from_json(json: &str) -> Result<RuleDocument, ExchangeError> {
        serde_json::from_str(json).map_err(|e| ExchangeError::Parse(e.to_string()))
    }
}
