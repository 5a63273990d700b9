//! Host collaborator seams.
//!
//! The engine stays out of storage: output groups and dependency edges
//! live with the host. These traits are the only way resolution touches
//! either, and the in-memory implementations back both the CLI and the
//! test suites.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Handle to a named output group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHandle {
    pub name: String,
}

/// Named output groups. `obtain` is called once per winning address rule
/// application, so implementations should make repeat lookups cheap.
pub trait GroupStore {
    /// Returns the named group, creating it when absent.
    fn obtain(&mut self, name: &str) -> GroupHandle;
}

/// Group store that records which groups a run created.
#[derive(Debug, Clone, Default)]
pub struct MemoryGroupStore {
    known: BTreeSet<String>,
    created: Vec<String>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the given groups already present.
    pub fn with_groups<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: names.into_iter().map(Into::into).collect(),
            created: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Groups created by `obtain`, in creation order.
    pub fn created(&self) -> &[String] {
        &self.created
    }
}

impl GroupStore for MemoryGroupStore {
    fn obtain(&mut self, name: &str) -> GroupHandle {
        if self.known.insert(name.to_string()) {
            self.created.push(name.to_string());
        }
        GroupHandle {
            name: name.to_string(),
        }
    }
}

/// Dependency edges between inventory paths. Backs closure filters; the
/// closure itself is computed once at setup time.
pub trait DependencyLookup {
    /// Direct dependencies of `path`. Unknown paths have none.
    fn dependencies_of(&self, path: &str) -> Vec<String>;
}

/// Dependency edges held in memory, loadable from a JSON object of
/// `path -> [dependency, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDependencyMap {
    edges: HashMap<String, Vec<String>>,
}

impl MemoryDependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, path: impl Into<String>, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges.insert(
            path.into(),
            dependencies.into_iter().map(Into::into).collect(),
        );
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl DependencyLookup for MemoryDependencyMap {
    fn dependencies_of(&self, path: &str) -> Vec<String> {
        self.edges.get(path).cloned().unwrap_or_default()
    }
}
