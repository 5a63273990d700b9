//! Evaluation and setup inputs.

use std::collections::HashMap;
use std::fmt;

use shelf_core::{AssetRecord, AssignedEntry, DependencyLookup};

/// Everything a filter sees when deciding whether one asset matches: the
/// record itself plus whatever the host currently has assigned to it.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub asset: &'a AssetRecord,
    pub current: Option<&'a AssignedEntry>,
}

impl<'a> MatchContext<'a> {
    pub fn new(asset: &'a AssetRecord, current: Option<&'a AssignedEntry>) -> Self {
        Self { asset, current }
    }

    /// The asset's current address, when it has one.
    pub fn current_address(&self) -> Option<&str> {
        self.current.and_then(|entry| entry.address.as_deref())
    }

    /// The asset's current group, when it has one.
    pub fn current_group(&self) -> Option<&str> {
        self.current.and_then(|entry| entry.group.as_deref())
    }

    /// The asset's current version, when it has one.
    pub fn current_version(&self) -> Option<&str> {
        self.current.and_then(|entry| entry.version.as_deref())
    }
}

/// One-time setup inputs for filters and providers: externally derived
/// values (build counters, revision ids) and the host's dependency edges.
#[derive(Default)]
pub struct SetupContext {
    external_values: HashMap<String, String>,
    dependencies: Option<Box<dyn DependencyLookup>>,
}

impl SetupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_external_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.external_values.insert(key.into(), value.into());
        self
    }

    pub fn with_external_values(mut self, values: HashMap<String, String>) -> Self {
        self.external_values.extend(values);
        self
    }

    pub fn with_dependencies(mut self, lookup: impl DependencyLookup + 'static) -> Self {
        self.dependencies = Some(Box::new(lookup));
        self
    }

    pub fn external_value(&self, key: &str) -> Option<&str> {
        self.external_values.get(key).map(String::as_str)
    }

    pub fn dependencies(&self) -> Option<&dyn DependencyLookup> {
        self.dependencies.as_deref()
    }
}

impl fmt::Debug for SetupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupContext")
            .field("external_values", &self.external_values.len())
            .field("has_dependencies", &self.dependencies.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::MemoryDependencyMap;

    #[test]
    fn test_context_accessors() {
        let asset = AssetRecord::new("a.png", "texture");
        let entry = AssignedEntry {
            address: Some("hero".to_string()),
            group: Some("textures".to_string()),
            ..Default::default()
        };

        let ctx = MatchContext::new(&asset, Some(&entry));
        assert_eq!(ctx.current_address(), Some("hero"));
        assert_eq!(ctx.current_group(), Some("textures"));
        assert_eq!(ctx.current_version(), None);

        let bare = MatchContext::new(&asset, None);
        assert_eq!(bare.current_address(), None);
    }

    #[test]
    fn test_setup_context_builder() {
        let mut deps = MemoryDependencyMap::new();
        deps.insert("scene.dat", ["a.png"]);

        let ctx = SetupContext::new()
            .with_external_value("build", "42")
            .with_dependencies(deps);

        assert_eq!(ctx.external_value("build"), Some("42"));
        assert_eq!(ctx.external_value("missing"), None);
        assert_eq!(
            ctx.dependencies().unwrap().dependencies_of("scene.dat"),
            vec!["a.png"]
        );
    }
}
