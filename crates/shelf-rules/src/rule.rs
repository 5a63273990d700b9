//! Rules: filters plus a provider plus an application policy.
//!
//! A rule names its filters and provider instead of owning them; the
//! definitions live in the [`Registry`](crate::registry::Registry) and are
//! shared, so editing one there changes every rule that references it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// The three things a rule can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Address,
    Label,
    Version,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 3] = [
        RuleCategory::Address,
        RuleCategory::Label,
        RuleCategory::Version,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Address => "address",
            RuleCategory::Label => "label",
            RuleCategory::Version => "version",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "address" => Ok(RuleCategory::Address),
            "label" => Ok(RuleCategory::Label),
            "version" => Ok(RuleCategory::Version),
            other => Err(format!(
                "unknown rule category '{other}' (expected 'address', 'label', or 'version')"
            )),
        }
    }
}

/// How a matching rule applies its provider's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RulePolicy {
    Address {
        /// Leave assets that already have an address untouched. The rule
        /// still wins the scan; the provider is simply never invoked.
        #[serde(default)]
        skip_existing: bool,
        /// Output group for assets this rule addresses.
        target_group: String,
    },
    Label {
        /// When false, pre-existing labels are cleared before this run's
        /// label outputs are applied.
        #[serde(default = "default_true")]
        append_to_existing: bool,
    },
    Version {
        /// Leave assets that already have a version untouched.
        #[serde(default)]
        skip_existing: bool,
    },
}

impl RulePolicy {
    pub fn category(&self) -> RuleCategory {
        match self {
            RulePolicy::Address { .. } => RuleCategory::Address,
            RulePolicy::Label { .. } => RuleCategory::Label,
            RulePolicy::Version { .. } => RuleCategory::Version,
        }
    }
}

/// A classification rule. Filters combine with AND, and a rule with no
/// filters matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Higher priority wins; ties fall back to declaration order.
    #[serde(default)]
    pub priority: i32,
    /// Names of registry filters, all of which must match.
    pub filters: Vec<String>,
    /// Name of the registry provider that produces the value.
    pub provider: String,
    pub policy: RulePolicy,
}

impl Rule {
    pub fn new(name: impl Into<String>, policy: RulePolicy) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            priority: 0,
            filters: Vec::new(),
            provider: String::new(),
            policy,
        }
    }

    pub fn builder(name: impl Into<String>, policy: RulePolicy) -> RuleBuilder {
        RuleBuilder {
            rule: Rule::new(name, policy),
        }
    }

    pub fn category(&self) -> RuleCategory {
        self.policy.category()
    }
}

/// Builder for [`Rule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.rule.enabled = enabled;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.rule.filters.push(name.into());
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.rule.provider = name.into();
        self
    }

    pub fn build(self) -> Rule {
        self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let rule = Rule::builder(
            "texture-addresses",
            RulePolicy::Address {
                skip_existing: true,
                target_group: "textures".to_string(),
            },
        )
        .description("Addresses for texture files")
        .priority(10)
        .filter("all-textures")
        .filter("not-excluded")
        .provider("tex-address")
        .build();

        assert_eq!(rule.name, "texture-addresses");
        assert!(rule.enabled);
        assert_eq!(rule.priority, 10);
        assert_eq!(rule.filters, vec!["all-textures", "not-excluded"]);
        assert_eq!(rule.provider, "tex-address");
        assert_eq!(rule.category(), RuleCategory::Address);
    }

    #[test]
    fn test_policy_serde_tagging() {
        let policy = RulePolicy::Label {
            append_to_existing: false,
        };
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(
            json,
            r#"{"category":"label","append_to_existing":false}"#
        );

        let parsed: RulePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, policy);
    }

    #[test]
    fn test_rule_defaults_on_deserialize() {
        let json = r#"{
            "name": "r",
            "filters": ["f"],
            "provider": "p",
            "policy": {"category": "version"}
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.priority, 0);
        assert_eq!(
            rule.policy,
            RulePolicy::Version {
                skip_existing: false
            }
        );
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Address".parse::<RuleCategory>(), Ok(RuleCategory::Address));
        assert_eq!("label".parse::<RuleCategory>(), Ok(RuleCategory::Label));
        assert!("tag".parse::<RuleCategory>().is_err());
    }
}
