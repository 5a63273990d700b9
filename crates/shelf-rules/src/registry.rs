//! Shared filter and provider definitions.
//!
//! The registry is the single owner of every filter and provider; rules
//! reference entries by name. Replacing an entry under a name is how an
//! edit reaches every rule that uses it.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::context::{MatchContext, SetupContext};
use crate::filter::{Filter, FilterError};
use crate::provider::{Provider, ProviderError};
use crate::rule::Rule;

/// Why registry setup failed.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Name-keyed store of filter and provider definitions.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    filters: HashMap<String, Filter>,
    providers: HashMap<String, Provider>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a filter under its name.
    pub fn add_filter(&mut self, filter: Filter) {
        if self.filters.contains_key(&filter.name) {
            debug!(filter = %filter.name, "replacing filter definition");
        }
        self.filters.insert(filter.name.clone(), filter);
    }

    /// Adds or replaces a provider under its name.
    pub fn add_provider(&mut self, provider: Provider) {
        if self.providers.contains_key(&provider.name) {
            debug!(provider = %provider.name, "replacing provider definition");
        }
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    pub fn filter_mut(&mut self, name: &str) -> Option<&mut Filter> {
        self.filters.get_mut(name)
    }

    pub fn provider_mut(&mut self, name: &str) -> Option<&mut Provider> {
        self.providers.get_mut(name)
    }

    pub fn remove_filter(&mut self, name: &str) -> Option<Filter> {
        self.filters.remove(name)
    }

    pub fn remove_provider(&mut self, name: &str) -> Option<Provider> {
        self.providers.remove(name)
    }

    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.values()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Sets up every filter and provider. Idempotent; stops at the first
    /// failure.
    pub fn setup(&mut self, ctx: &SetupContext) -> Result<(), RegistryError> {
        for filter in self.filters.values_mut() {
            filter.setup(ctx)?;
        }
        for provider in self.providers.values_mut() {
            provider.setup(ctx)?;
        }
        debug!(
            filters = self.filters.len(),
            providers = self.providers.len(),
            "registry set up"
        );
        Ok(())
    }

    /// Whether a rule matches the asset: the rule is enabled, names at
    /// least one filter, and every named filter matches. Unknown filter
    /// names never match; validation reports them separately.
    pub fn rule_matches(&self, rule: &Rule, ctx: &MatchContext<'_>) -> bool {
        if !rule.enabled || rule.filters.is_empty() {
            return false;
        }
        rule.filters.iter().all(|name| {
            self.filter(name)
                .map(|filter| filter.is_match(ctx))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;
    use crate::provider::ProviderKind;
    use crate::rule::{Rule, RulePolicy};
    use shelf_core::AssetRecord;

    fn glob_filter(name: &str, pattern: &str) -> Filter {
        Filter::new(
            name,
            FilterKind::PathGlob {
                patterns: vec![pattern.to_string()],
            },
        )
    }

    fn address_rule(name: &str, filters: &[&str]) -> Rule {
        let mut builder = Rule::builder(
            name,
            RulePolicy::Address {
                skip_existing: false,
                target_group: "default".to_string(),
            },
        )
        .provider("addr");
        for filter in filters {
            builder = builder.filter(*filter);
        }
        builder.build()
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.add_filter(glob_filter("pngs", "**/*.png"));
        registry.add_filter(glob_filter("under-assets", "assets/**"));
        registry.add_provider(Provider::new(
            "addr",
            ProviderKind::AddressFromFilename {
                include_extension: false,
                to_lowercase: false,
            },
        ));
        registry.setup(&SetupContext::new()).unwrap();
        registry
    }

    #[test]
    fn test_lookup_and_replace() {
        let mut registry = registry();
        assert_eq!(registry.filter_count(), 2);
        assert!(registry.filter("pngs").is_some());
        assert!(registry.filter("missing").is_none());

        registry.add_filter(glob_filter("pngs", "**/*.jpg"));
        assert_eq!(registry.filter_count(), 2);
        assert!(!registry.filter("pngs").unwrap().is_ready());
    }

    #[test]
    fn test_rule_matches_all_filters() {
        let registry = registry();
        let both = AssetRecord::new("assets/hero.png", "texture");
        let only_png = AssetRecord::new("elsewhere/hero.png", "texture");

        let rule = address_rule("r", &["pngs", "under-assets"]);
        assert!(registry.rule_matches(&rule, &MatchContext::new(&both, None)));
        assert!(!registry.rule_matches(&rule, &MatchContext::new(&only_png, None)));
    }

    #[test]
    fn test_disabled_and_empty_rules_never_match() {
        let registry = registry();
        let record = AssetRecord::new("assets/hero.png", "texture");
        let ctx = MatchContext::new(&record, None);

        let mut disabled = address_rule("r", &["pngs"]);
        disabled.enabled = false;
        assert!(!registry.rule_matches(&disabled, &ctx));

        let empty = address_rule("r", &[]);
        assert!(!registry.rule_matches(&empty, &ctx));

        let unknown = address_rule("r", &["no-such-filter"]);
        assert!(!registry.rule_matches(&unknown, &ctx));
    }

    #[test]
    fn test_setup_propagates_failures() {
        let mut registry = Registry::new();
        registry.add_filter(Filter::new(
            "broken",
            FilterKind::AddressPattern {
                pattern: "([unclosed".to_string(),
            },
        ));
        assert!(matches!(
            registry.setup(&SetupContext::new()),
            Err(RegistryError::Filter(_))
        ));
    }
}
