//! # shelf-rules
//!
//! Rule, filter, and provider definitions for Shelfmark.
//!
//! This crate provides the shared filter/provider registry, the rule and
//! rule-set model with structural validation, the YAML authoring config
//! loader, and export/import of the portable rule document.

pub mod config;
pub mod context;
pub mod exchange;
pub mod filter;
pub mod provider;
pub mod registry;
pub mod rule;
pub mod ruleset;

pub use config::{load_rules, save_rules, ConfigError, LoadedRules, RulesFile};
pub use context::{MatchContext, SetupContext};
pub use exchange::{
    ImportFailure, ImportMode, ImportReport, RuleDocument, RuleEntry, RuleExporter, RuleImporter,
};
pub use filter::{Filter, FilterError, FilterKind};
pub use provider::{Provider, ProviderError, ProviderKind, ProviderOutput};
pub use registry::{Registry, RegistryError};
pub use rule::{Rule, RuleBuilder, RuleCategory, RulePolicy};
pub use ruleset::{evaluation_order, RuleSet, StructuralError, ValidationReport};
