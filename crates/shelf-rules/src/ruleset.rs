//! Rule sets and structural validation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shelf_core::VersionExpression;

use crate::registry::Registry;
use crate::rule::{Rule, RuleCategory};

/// A problem that makes a rule set unusable. Resolution refuses to run
/// while any of these are present.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("rule '{rule}' has no filters; a rule with no filters never matches")]
    EmptyFilterList { rule: String },
    #[error("rule '{rule}' references unknown filter '{filter}'")]
    UnknownFilter { rule: String, filter: String },
    #[error("rule '{rule}' references unknown provider '{provider}'")]
    UnknownProvider { rule: String, provider: String },
    #[error(
        "rule '{rule}' is {rule_category} but provider '{provider}' yields {provider_category} output"
    )]
    CategoryMismatch {
        rule: String,
        provider: String,
        rule_category: RuleCategory,
        provider_category: RuleCategory,
    },
    #[error("rule '{rule}' sits in the {list} list but its policy is {policy}")]
    MisplacedRule {
        rule: String,
        list: RuleCategory,
        policy: RuleCategory,
    },
    #[error("duplicate rule name '{rule}' in the {category} list")]
    DuplicateRuleName {
        rule: String,
        category: RuleCategory,
    },
    #[error("rule '{rule}' has an empty target group")]
    EmptyTargetGroup { rule: String },
    #[error("filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
    #[error("provider '{provider}': {message}")]
    InvalidProvider { provider: String, message: String },
}

/// Outcome of structural validation: hard errors plus advisory warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<StructuralError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: StructuralError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "error: {error}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

/// Evaluation order for one category's rules: indices sorted by
/// descending priority, with declaration order breaking ties.
pub fn evaluation_order(rules: &[Rule]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rules.len()).collect();
    order.sort_by_key(|&index| std::cmp::Reverse(rules[index].priority));
    order
}

/// A complete rule configuration: one rule list per category plus the
/// global version gate. Rule lists are only reachable through add and
/// remove so that every rule sits in the list its policy belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    address_rules: Vec<Rule>,
    label_rules: Vec<Rule>,
    version_rules: Vec<Rule>,
    /// When set, versions produced by rules must fall inside this range
    /// or they are dropped with a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range_filter: Option<VersionExpression>,
    /// When set, assets that finish a run without a version are excluded
    /// from the output inventory.
    #[serde(default)]
    pub exclude_unversioned: bool,
}

impl RuleSet {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            description: None,
            address_rules: Vec::new(),
            label_rules: Vec::new(),
            version_rules: Vec::new(),
            version_range_filter: None,
            exclude_unversioned: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a rule to the list its policy belongs to.
    pub fn add_rule(&mut self, rule: Rule) {
        debug!(rule = %rule.name, category = %rule.category(), "adding rule");
        match rule.category() {
            RuleCategory::Address => self.address_rules.push(rule),
            RuleCategory::Label => self.label_rules.push(rule),
            RuleCategory::Version => self.version_rules.push(rule),
        }
    }

    /// Removes a rule by name from one category's list.
    pub fn remove_rule(&mut self, category: RuleCategory, name: &str) -> Option<Rule> {
        let rules = self.rules_mut(category);
        let index = rules.iter().position(|rule| rule.name == name)?;
        Some(rules.remove(index))
    }

    /// Empties all three rule lists, leaving settings untouched.
    pub fn clear_rules(&mut self) {
        self.address_rules.clear();
        self.label_rules.clear();
        self.version_rules.clear();
    }

    pub fn rules(&self, category: RuleCategory) -> &[Rule] {
        match category {
            RuleCategory::Address => &self.address_rules,
            RuleCategory::Label => &self.label_rules,
            RuleCategory::Version => &self.version_rules,
        }
    }

    pub fn rule_mut(&mut self, category: RuleCategory, name: &str) -> Option<&mut Rule> {
        self.rules_mut(category)
            .iter_mut()
            .find(|rule| rule.name == name)
    }

    pub fn contains_rule(&self, category: RuleCategory, name: &str) -> bool {
        self.rules(category).iter().any(|rule| rule.name == name)
    }

    pub fn rule_count(&self) -> usize {
        self.address_rules.len() + self.label_rules.len() + self.version_rules.len()
    }

    fn rules_mut(&mut self, category: RuleCategory) -> &mut Vec<Rule> {
        match category {
            RuleCategory::Address => &mut self.address_rules,
            RuleCategory::Label => &mut self.label_rules,
            RuleCategory::Version => &mut self.version_rules,
        }
    }

    /// All rules across the three categories, address first.
    pub fn iter_rules(&self) -> impl Iterator<Item = &Rule> {
        self.address_rules
            .iter()
            .chain(self.label_rules.iter())
            .chain(self.version_rules.iter())
    }

    /// Checks every rule against the registry: references must resolve,
    /// provider categories must agree with rule policies, names must be
    /// unique per category, and filter/provider parameters must be
    /// well-formed. Findings that do not block resolution (disabled
    /// rules, an empty rule set) come back as warnings.
    pub fn validate(&self, registry: &Registry) -> ValidationReport {
        let mut report = ValidationReport::new();

        for filter in registry.filters() {
            if let Err(err) = filter.validate() {
                report.add_error(StructuralError::InvalidFilter {
                    filter: filter.name.clone(),
                    message: err.to_string(),
                });
            }
        }
        for provider in registry.providers() {
            if let Err(err) = provider.validate() {
                report.add_error(StructuralError::InvalidProvider {
                    provider: provider.name.clone(),
                    message: err.to_string(),
                });
            }
        }

        if self.rule_count() == 0 {
            report.add_warning("rule set has no rules");
        }

        for category in RuleCategory::ALL {
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            for rule in self.rules(category) {
                if !seen.insert(rule.name.as_str()) {
                    report.add_error(StructuralError::DuplicateRuleName {
                        rule: rule.name.clone(),
                        category,
                    });
                }
                if rule.category() != category {
                    report.add_error(StructuralError::MisplacedRule {
                        rule: rule.name.clone(),
                        list: category,
                        policy: rule.category(),
                    });
                }
                self.validate_rule(rule, registry, &mut report);
            }
        }
        report
    }

    fn validate_rule(&self, rule: &Rule, registry: &Registry, report: &mut ValidationReport) {
        if rule.filters.is_empty() {
            report.add_error(StructuralError::EmptyFilterList {
                rule: rule.name.clone(),
            });
        }
        for filter_name in &rule.filters {
            if registry.filter(filter_name).is_none() {
                report.add_error(StructuralError::UnknownFilter {
                    rule: rule.name.clone(),
                    filter: filter_name.clone(),
                });
            }
        }
        match registry.provider(&rule.provider) {
            None => report.add_error(StructuralError::UnknownProvider {
                rule: rule.name.clone(),
                provider: rule.provider.clone(),
            }),
            Some(provider) => {
                if provider.kind.category() != rule.category() {
                    report.add_error(StructuralError::CategoryMismatch {
                        rule: rule.name.clone(),
                        provider: rule.provider.clone(),
                        rule_category: rule.category(),
                        provider_category: provider.kind.category(),
                    });
                }
            }
        }
        if let crate::rule::RulePolicy::Address { target_group, .. } = &rule.policy {
            if target_group.trim().is_empty() {
                report.add_error(StructuralError::EmptyTargetGroup {
                    rule: rule.name.clone(),
                });
            }
        }
        if !rule.enabled {
            report.add_warning(format!("rule '{}' is disabled", rule.name));
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, FilterKind};
    use crate::provider::{Provider, ProviderKind};
    use crate::rule::RulePolicy;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.add_filter(Filter::new(
            "pngs",
            FilterKind::PathGlob {
                patterns: vec!["**/*.png".to_string()],
            },
        ));
        registry.add_provider(Provider::new(
            "addr",
            ProviderKind::AddressFromFilename {
                include_extension: false,
                to_lowercase: false,
            },
        ));
        registry.add_provider(Provider::new(
            "labels",
            ProviderKind::ConstantLabels {
                labels: vec!["ui".to_string()],
            },
        ));
        registry
    }

    fn address_rule(name: &str) -> Rule {
        Rule::builder(
            name,
            RulePolicy::Address {
                skip_existing: false,
                target_group: "main".to_string(),
            },
        )
        .filter("pngs")
        .provider("addr")
        .build()
    }

    #[test]
    fn test_add_rule_routes_by_category() {
        let mut set = RuleSet::new();
        set.add_rule(address_rule("a"));
        set.add_rule(
            Rule::builder(
                "l",
                RulePolicy::Label {
                    append_to_existing: true,
                },
            )
            .filter("pngs")
            .provider("labels")
            .build(),
        );

        assert_eq!(set.rules(RuleCategory::Address).len(), 1);
        assert_eq!(set.rules(RuleCategory::Label).len(), 1);
        assert_eq!(set.rules(RuleCategory::Version).len(), 0);
        assert_eq!(set.rule_count(), 2);
        assert!(set.contains_rule(RuleCategory::Address, "a"));
    }

    #[test]
    fn test_remove_rule() {
        let mut set = RuleSet::new();
        set.add_rule(address_rule("a"));
        assert!(set.remove_rule(RuleCategory::Address, "a").is_some());
        assert!(set.remove_rule(RuleCategory::Address, "a").is_none());
        assert_eq!(set.rule_count(), 0);
    }

    #[test]
    fn test_evaluation_order_priority_then_declaration() {
        let mut set = RuleSet::new();
        let mut low = address_rule("low");
        low.priority = 1;
        let mut first_high = address_rule("first-high");
        first_high.priority = 10;
        let mut second_high = address_rule("second-high");
        second_high.priority = 10;
        set.add_rule(low);
        set.add_rule(first_high);
        set.add_rule(second_high);

        let order = evaluation_order(set.rules(RuleCategory::Address));
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_validate_passes_clean_set() {
        let mut set = RuleSet::new();
        set.add_rule(address_rule("a"));
        let report = set.validate(&registry());
        assert!(report.is_valid(), "{report}");
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_validate_structural_errors() {
        let mut set = RuleSet::new();

        let mut no_filters = address_rule("no-filters");
        no_filters.filters.clear();
        set.add_rule(no_filters);

        let mut unknown_filter = address_rule("unknown-filter");
        unknown_filter.filters = vec!["missing".to_string()];
        set.add_rule(unknown_filter);

        let mut unknown_provider = address_rule("unknown-provider");
        unknown_provider.provider = "missing".to_string();
        set.add_rule(unknown_provider);

        let mut mismatched = address_rule("mismatched");
        mismatched.provider = "labels".to_string();
        set.add_rule(mismatched);

        let mut empty_group = address_rule("empty-group");
        empty_group.policy = RulePolicy::Address {
            skip_existing: false,
            target_group: "  ".to_string(),
        };
        set.add_rule(empty_group);

        set.add_rule(address_rule("dup"));
        set.add_rule(address_rule("dup"));

        let report = set.validate(&registry());
        assert!(report.has_errors());
        let has = |pred: &dyn Fn(&StructuralError) -> bool| report.errors.iter().any(pred);
        assert!(has(&|e| matches!(e, StructuralError::EmptyFilterList { .. })));
        assert!(has(&|e| matches!(e, StructuralError::UnknownFilter { .. })));
        assert!(has(&|e| matches!(e, StructuralError::UnknownProvider { .. })));
        assert!(has(&|e| matches!(e, StructuralError::CategoryMismatch { .. })));
        assert!(has(&|e| matches!(e, StructuralError::EmptyTargetGroup { .. })));
        assert!(has(&|e| matches!(e, StructuralError::DuplicateRuleName { .. })));
    }

    #[test]
    fn test_validate_reports_bad_registry_entries() {
        let mut registry = registry();
        registry.add_filter(Filter::new(
            "broken",
            FilterKind::PathGlob { patterns: vec![] },
        ));
        let set = RuleSet::new();
        let report = set.validate(&registry);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, StructuralError::InvalidFilter { .. })));
    }

    #[test]
    fn test_validate_warns_on_disabled_and_empty() {
        let set = RuleSet::new();
        let report = set.validate(&registry());
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("no rules")));

        let mut set = RuleSet::new();
        let mut rule = address_rule("off");
        rule.enabled = false;
        set.add_rule(rule);
        let report = set.validate(&registry());
        assert!(report.warnings.iter().any(|w| w.contains("disabled")));
    }

    #[test]
    fn test_serde_round_trip_keeps_private_lists() {
        let mut set = RuleSet::new().with_description("demo");
        set.add_rule(address_rule("a"));
        set.exclude_unversioned = true;

        let json = serde_json::to_string(&set).unwrap();
        let parsed: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, set.id);
        assert_eq!(parsed.rules(RuleCategory::Address).len(), 1);
        assert!(parsed.exclude_unversioned);
    }
}
