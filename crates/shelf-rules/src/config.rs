//! Rules file loading.
//!
//! The authoring format is YAML: global settings, inline filter and
//! provider definitions, and one rule list per category. `${VAR}`
//! references are substituted from the environment before parsing, and
//! the result is structurally validated before anyone gets to run it.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use shelf_core::VersionExpression;

use crate::filter::Filter;
use crate::provider::Provider;
use crate::registry::Registry;
use crate::rule::{Rule, RuleCategory, RulePolicy};
use crate::ruleset::RuleSet;

/// Format version written into new rules files.
pub const RULES_FILE_VERSION: &str = "1.0";

fn default_file_version() -> String {
    RULES_FILE_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

/// Why a rules file could not be loaded or saved.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse rules file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),
    #[error("duplicate {what} name '{name}'")]
    DuplicateName { what: &'static str, name: String },
    #[error("invalid version range '{range}': {source}")]
    InvalidVersionRange {
        range: String,
        source: shelf_core::RangeError,
    },
    #[error("rules file failed validation:\n{0}")]
    Invalid(String),
}

/// On-disk shape of a rules file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default = "default_file_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: RulesFileSettings,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub rules: RuleSections,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFileSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,
    #[serde(default)]
    pub exclude_unversioned: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSections {
    #[serde(default)]
    pub address: Vec<AddressRuleEntry>,
    #[serde(default)]
    pub label: Vec<LabelRuleEntry>,
    #[serde(default)]
    pub version: Vec<VersionRuleEntry>,
}

/// Address rule as written in the file; the policy fields sit inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRuleEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub filters: Vec<String>,
    pub provider: String,
    #[serde(default)]
    pub skip_existing: bool,
    pub target_group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRuleEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub filters: Vec<String>,
    pub provider: String,
    #[serde(default = "default_true")]
    pub append_to_existing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRuleEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub filters: Vec<String>,
    pub provider: String,
    #[serde(default)]
    pub skip_existing: bool,
}

impl AddressRuleEntry {
    fn into_rule(self) -> Rule {
        Rule {
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            priority: self.priority,
            filters: self.filters,
            provider: self.provider,
            policy: RulePolicy::Address {
                skip_existing: self.skip_existing,
                target_group: self.target_group,
            },
        }
    }

    fn from_rule(rule: &Rule) -> Option<Self> {
        let RulePolicy::Address {
            skip_existing,
            target_group,
        } = &rule.policy
        else {
            return None;
        };
        Some(Self {
            name: rule.name.clone(),
            description: rule.description.clone(),
            enabled: rule.enabled,
            priority: rule.priority,
            filters: rule.filters.clone(),
            provider: rule.provider.clone(),
            skip_existing: *skip_existing,
            target_group: target_group.clone(),
        })
    }
}

impl LabelRuleEntry {
    fn into_rule(self) -> Rule {
        Rule {
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            priority: self.priority,
            filters: self.filters,
            provider: self.provider,
            policy: RulePolicy::Label {
                append_to_existing: self.append_to_existing,
            },
        }
    }

    fn from_rule(rule: &Rule) -> Option<Self> {
        let RulePolicy::Label { append_to_existing } = &rule.policy else {
            return None;
        };
        Some(Self {
            name: rule.name.clone(),
            description: rule.description.clone(),
            enabled: rule.enabled,
            priority: rule.priority,
            filters: rule.filters.clone(),
            provider: rule.provider.clone(),
            append_to_existing: *append_to_existing,
        })
    }
}

impl VersionRuleEntry {
    fn into_rule(self) -> Rule {
        Rule {
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            priority: self.priority,
            filters: self.filters,
            provider: self.provider,
            policy: RulePolicy::Version {
                skip_existing: self.skip_existing,
            },
        }
    }

    fn from_rule(rule: &Rule) -> Option<Self> {
        let RulePolicy::Version { skip_existing } = &rule.policy else {
            return None;
        };
        Some(Self {
            name: rule.name.clone(),
            description: rule.description.clone(),
            enabled: rule.enabled,
            priority: rule.priority,
            filters: rule.filters.clone(),
            provider: rule.provider.clone(),
            skip_existing: *skip_existing,
        })
    }
}

/// A loaded and structurally valid rules configuration. Filters and
/// providers still need `Registry::setup` before resolution.
#[derive(Debug, Clone)]
pub struct LoadedRules {
    pub registry: Registry,
    pub rule_set: RuleSet,
}

/// Loads a rules file, substituting `${VAR}` environment references and
/// validating the result.
pub fn load_rules(path: impl AsRef<Path>) -> Result<LoadedRules, ConfigError> {
    let raw = fs::read_to_string(path.as_ref())?;
    let substituted = substitute_env_vars(&raw)?;
    let file: RulesFile = serde_yaml::from_str(&substituted)?;
    debug!(
        path = %path.as_ref().display(),
        filters = file.filters.len(),
        providers = file.providers.len(),
        "parsed rules file"
    );
    build_loaded(file)
}

/// Builds the registry and rule set from an already-parsed file.
pub fn build_loaded(file: RulesFile) -> Result<LoadedRules, ConfigError> {
    let mut registry = Registry::new();

    let mut seen_filters = std::collections::BTreeSet::new();
    for filter in file.filters {
        if !seen_filters.insert(filter.name.clone()) {
            return Err(ConfigError::DuplicateName {
                what: "filter",
                name: filter.name,
            });
        }
        registry.add_filter(filter);
    }
    let mut seen_providers = std::collections::BTreeSet::new();
    for provider in file.providers {
        if !seen_providers.insert(provider.name.clone()) {
            return Err(ConfigError::DuplicateName {
                what: "provider",
                name: provider.name,
            });
        }
        registry.add_provider(provider);
    }

    let mut rule_set = RuleSet::new();
    rule_set.description = file.description;
    rule_set.exclude_unversioned = file.settings.exclude_unversioned;
    if let Some(raw_range) = &file.settings.version_range {
        let range = VersionExpression::parse(raw_range).map_err(|source| {
            ConfigError::InvalidVersionRange {
                range: raw_range.clone(),
                source,
            }
        })?;
        rule_set.version_range_filter = Some(range);
    }

    for entry in file.rules.address {
        rule_set.add_rule(entry.into_rule());
    }
    for entry in file.rules.label {
        rule_set.add_rule(entry.into_rule());
    }
    for entry in file.rules.version {
        rule_set.add_rule(entry.into_rule());
    }

    let report = rule_set.validate(&registry);
    if report.has_errors() {
        return Err(ConfigError::Invalid(report.to_string()));
    }
    for warning in &report.warnings {
        warn!(%warning, "rules file warning");
    }

    Ok(LoadedRules { registry, rule_set })
}

/// Rebuilds the on-disk shape from live definitions. Filters and
/// providers are written sorted by name so saved files diff cleanly.
pub fn to_rules_file(registry: &Registry, rule_set: &RuleSet) -> RulesFile {
    let mut filters: Vec<Filter> = registry.filters().cloned().collect();
    filters.sort_by(|a, b| a.name.cmp(&b.name));
    let mut providers: Vec<Provider> = registry.providers().cloned().collect();
    providers.sort_by(|a, b| a.name.cmp(&b.name));

    RulesFile {
        version: RULES_FILE_VERSION.to_string(),
        description: rule_set.description.clone(),
        settings: RulesFileSettings {
            version_range: rule_set
                .version_range_filter
                .as_ref()
                .map(ToString::to_string),
            exclude_unversioned: rule_set.exclude_unversioned,
        },
        filters,
        providers,
        rules: RuleSections {
            address: rule_set
                .rules(RuleCategory::Address)
                .iter()
                .filter_map(AddressRuleEntry::from_rule)
                .collect(),
            label: rule_set
                .rules(RuleCategory::Label)
                .iter()
                .filter_map(LabelRuleEntry::from_rule)
                .collect(),
            version: rule_set
                .rules(RuleCategory::Version)
                .iter()
                .filter_map(VersionRuleEntry::from_rule)
                .collect(),
        },
    }
}

/// Writes the configuration back out as YAML.
pub fn save_rules(
    path: impl AsRef<Path>,
    registry: &Registry,
    rule_set: &RuleSet,
) -> Result<(), ConfigError> {
    let file = to_rules_file(registry, rule_set);
    let yaml = serde_yaml::to_string(&file)?;
    fs::write(path, yaml)?;
    Ok(())
}

fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference pattern is valid");
    let mut missing: Option<String> = None;
    let result = pattern.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(result.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
version: "1.0"
description: "Texture addressing"
settings:
  version_range: "[1.0.0,2.0.0)"
  exclude_unversioned: true
filters:
  - name: all-textures
    type: path_glob
    patterns: ["assets/textures/**"]
providers:
  - name: tex-address
    type: address_from_path
    strip_prefix: "assets/"
  - name: pack-version
    type: constant_version
    version: "1.2.0"
rules:
  address:
    - name: texture-addresses
      priority: 10
      filters: [all-textures]
      provider: tex-address
      skip_existing: true
      target_group: textures
  version:
    - name: pack-versions
      filters: [all-textures]
      provider: pack-version
"#;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_file() {
        let file = write_file(MINIMAL);
        let loaded = load_rules(file.path()).unwrap();

        assert_eq!(loaded.registry.filter_count(), 1);
        assert_eq!(loaded.registry.provider_count(), 2);
        assert_eq!(loaded.rule_set.rules(RuleCategory::Address).len(), 1);
        assert_eq!(loaded.rule_set.rules(RuleCategory::Version).len(), 1);
        assert!(loaded.rule_set.exclude_unversioned);
        assert_eq!(
            loaded
                .rule_set
                .version_range_filter
                .as_ref()
                .unwrap()
                .to_string(),
            "[1.0.0,2.0.0)"
        );

        let rule = &loaded.rule_set.rules(RuleCategory::Address)[0];
        assert_eq!(rule.priority, 10);
        assert_eq!(
            rule.policy,
            RulePolicy::Address {
                skip_existing: true,
                target_group: "textures".to_string()
            }
        );
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("SHELF_TEST_GROUP", "from-env");
        let content = MINIMAL.replace("target_group: textures", "target_group: ${SHELF_TEST_GROUP}");
        let file = write_file(&content);
        let loaded = load_rules(file.path()).unwrap();
        let rule = &loaded.rule_set.rules(RuleCategory::Address)[0];
        assert_eq!(
            rule.policy,
            RulePolicy::Address {
                skip_existing: true,
                target_group: "from-env".to_string()
            }
        );
    }

    #[test]
    fn test_missing_env_var() {
        let content = MINIMAL.replace(
            "target_group: textures",
            "target_group: ${SHELF_TEST_UNSET_VARIABLE}",
        );
        let file = write_file(&content);
        let err = load_rules(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "SHELF_TEST_UNSET_VARIABLE"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let content = MINIMAL.replace(
            "filters:\n  - name: all-textures",
            "filters:\n  - name: all-textures\n    type: path_glob\n    patterns: [\"x/**\"]\n  - name: all-textures",
        );
        let file = write_file(&content);
        let err = load_rules(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { what: "filter", .. }));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let content = MINIMAL.replace("[1.0.0,2.0.0)", "[2.0.0,1.0.0)");
        let file = write_file(&content);
        let err = load_rules(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersionRange { .. }));
    }

    #[test]
    fn test_unknown_reference_fails_validation() {
        let content = MINIMAL.replace("provider: tex-address", "provider: nope");
        let file = write_file(&content);
        let err = load_rules(file.path()).unwrap_err();
        match err {
            ConfigError::Invalid(details) => assert!(details.contains("unknown provider 'nope'")),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let file = write_file(MINIMAL);
        let loaded = load_rules(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        save_rules(out.path(), &loaded.registry, &loaded.rule_set).unwrap();
        let reloaded = load_rules(out.path()).unwrap();

        assert_eq!(
            reloaded.registry.filter_count(),
            loaded.registry.filter_count()
        );
        assert_eq!(reloaded.rule_set.rule_count(), loaded.rule_set.rule_count());
        assert_eq!(
            reloaded.rule_set.rules(RuleCategory::Address)[0],
            loaded.rule_set.rules(RuleCategory::Address)[0]
        );
    }
}
