//! Asset filters.
//!
//! A filter is a named, stateless predicate over one asset. Parameters are
//! data (serde-tagged by `type`), so filters travel through config files
//! and rule documents untouched. `setup` compiles the parameters into a
//! matcher once; `is_match` is pure after that, and an un-setup filter
//! matches nothing rather than panicking.

use std::collections::{BTreeSet, VecDeque};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use shelf_core::asset;

use crate::context::{MatchContext, SetupContext};

/// Filter parameter payloads, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    /// Any of the glob patterns matches the path. `*` stays within one
    /// path segment; `**` crosses segments.
    PathGlob { patterns: Vec<String> },
    /// The asset's type tag is in the set.
    TypeMatch { types: Vec<String> },
    /// The path's extension is in the set. Dots and case are ignored, so
    /// `"PNG"`, `".png"`, and `"png"` are the same entry.
    ExtensionSet { extensions: Vec<String> },
    /// The asset's existing address matches the regex. Assets without an
    /// address never match.
    AddressPattern { pattern: String },
    /// The asset's current group is in the set. Assets without a group
    /// never match.
    GroupMembership { groups: Vec<String> },
    /// The path is one of an explicit list.
    ObjectSet { paths: Vec<String> },
    /// Every whitespace-separated term matches. Terms take `path:`,
    /// `type:`, `ext:`, or `name:` prefixes; a bare term is a path
    /// substring. Matching is case-insensitive.
    Query { expression: String },
    /// The path is in the transitive dependency closure of the roots
    /// (roots included), walked once at setup time.
    DependencyClosure { roots: Vec<String> },
}

impl FilterKind {
    /// Stable kind name, matching the serde tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterKind::PathGlob { .. } => "path_glob",
            FilterKind::TypeMatch { .. } => "type_match",
            FilterKind::ExtensionSet { .. } => "extension_set",
            FilterKind::AddressPattern { .. } => "address_pattern",
            FilterKind::GroupMembership { .. } => "group_membership",
            FilterKind::ObjectSet { .. } => "object_set",
            FilterKind::Query { .. } => "query",
            FilterKind::DependencyClosure { .. } => "dependency_closure",
        }
    }
}

/// Why a filter's parameters are unusable.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter '{name}' has no {what}")]
    EmptyParameters { name: String, what: &'static str },
    #[error("filter '{name}': invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        name: String,
        pattern: String,
        source: globset::Error,
    },
    #[error("filter '{name}': invalid regex '{pattern}': {source}")]
    InvalidRegex {
        name: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("filter '{name}': query expression is empty")]
    EmptyQuery { name: String },
    #[error("filter '{name}' needs a dependency lookup to resolve its closure roots")]
    MissingDependencyLookup { name: String },
}

#[derive(Debug, Clone)]
enum CompiledMatcher {
    Globs(GlobSet),
    Types(BTreeSet<String>),
    Extensions(BTreeSet<String>),
    Address(Regex),
    Groups(BTreeSet<String>),
    Paths(BTreeSet<String>),
    Query(Vec<QueryTerm>),
    Closure(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryTerm {
    PathContains(String),
    TypeIs(String),
    ExtensionIs(String),
    NameContains(String),
}

impl QueryTerm {
    fn matches(&self, asset: &shelf_core::AssetRecord) -> bool {
        match self {
            QueryTerm::PathContains(needle) => asset.path.to_lowercase().contains(needle),
            QueryTerm::TypeIs(wanted) => asset.asset_type.eq_ignore_ascii_case(wanted),
            QueryTerm::ExtensionIs(wanted) => asset
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
            QueryTerm::NameContains(needle) => asset.file_name().to_lowercase().contains(needle),
        }
    }
}

fn parse_query(expression: &str) -> Vec<QueryTerm> {
    expression
        .split_whitespace()
        .map(|term| {
            if let Some(value) = term.strip_prefix("path:") {
                QueryTerm::PathContains(value.to_lowercase())
            } else if let Some(value) = term.strip_prefix("type:") {
                QueryTerm::TypeIs(value.to_lowercase())
            } else if let Some(value) = term.strip_prefix("ext:") {
                QueryTerm::ExtensionIs(value.trim_start_matches('.').to_lowercase())
            } else if let Some(value) = term.strip_prefix("name:") {
                QueryTerm::NameContains(value.to_lowercase())
            } else {
                QueryTerm::PathContains(term.to_lowercase())
            }
        })
        .collect()
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// A named filter definition plus its compiled matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    #[serde(flatten)]
    pub kind: FilterKind,
    #[serde(skip)]
    compiled: Option<CompiledMatcher>,
}

impl Filter {
    pub fn new(name: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            compiled: None,
        }
    }

    /// Checks the parameters without compiling anything permanent. This is
    /// what structural validation calls; setup repeats the checks and
    /// keeps the result.
    pub fn validate(&self) -> Result<(), FilterError> {
        match &self.kind {
            FilterKind::PathGlob { patterns } => {
                self.require_non_empty(patterns, "glob patterns")?;
                for pattern in patterns {
                    self.compile_glob(pattern)?;
                }
                Ok(())
            }
            FilterKind::TypeMatch { types } => self.require_non_empty(types, "type tags"),
            FilterKind::ExtensionSet { extensions } => {
                self.require_non_empty(extensions, "extensions")
            }
            FilterKind::AddressPattern { pattern } => {
                Regex::new(pattern).map_err(|source| FilterError::InvalidRegex {
                    name: self.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(())
            }
            FilterKind::GroupMembership { groups } => self.require_non_empty(groups, "groups"),
            FilterKind::ObjectSet { paths } => self.require_non_empty(paths, "paths"),
            FilterKind::Query { expression } => {
                if expression.split_whitespace().next().is_none() {
                    return Err(FilterError::EmptyQuery {
                        name: self.name.clone(),
                    });
                }
                Ok(())
            }
            FilterKind::DependencyClosure { roots } => self.require_non_empty(roots, "roots"),
        }
    }

    /// Compiles the matcher. Idempotent; calling it again rebuilds the
    /// compiled state from the current parameters.
    pub fn setup(&mut self, ctx: &SetupContext) -> Result<(), FilterError> {
        self.validate()?;
        let compiled = match &self.kind {
            FilterKind::PathGlob { patterns } => {
                let mut builder = GlobSetBuilder::new();
                for pattern in patterns {
                    builder.add(self.compile_glob(pattern)?);
                }
                let set = builder.build().map_err(|source| FilterError::InvalidGlob {
                    name: self.name.clone(),
                    pattern: patterns.join(", "),
                    source,
                })?;
                CompiledMatcher::Globs(set)
            }
            FilterKind::TypeMatch { types } => {
                CompiledMatcher::Types(types.iter().cloned().collect())
            }
            FilterKind::ExtensionSet { extensions } => CompiledMatcher::Extensions(
                extensions.iter().map(|e| normalize_extension(e)).collect(),
            ),
            FilterKind::AddressPattern { pattern } => {
                let regex = Regex::new(pattern).map_err(|source| FilterError::InvalidRegex {
                    name: self.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                CompiledMatcher::Address(regex)
            }
            FilterKind::GroupMembership { groups } => {
                CompiledMatcher::Groups(groups.iter().cloned().collect())
            }
            FilterKind::ObjectSet { paths } => {
                CompiledMatcher::Paths(paths.iter().cloned().collect())
            }
            FilterKind::Query { expression } => CompiledMatcher::Query(parse_query(expression)),
            FilterKind::DependencyClosure { roots } => {
                let lookup =
                    ctx.dependencies()
                        .ok_or_else(|| FilterError::MissingDependencyLookup {
                            name: self.name.clone(),
                        })?;
                let mut closure: BTreeSet<String> = BTreeSet::new();
                let mut queue: VecDeque<String> = roots.iter().cloned().collect();
                while let Some(path) = queue.pop_front() {
                    if closure.insert(path.clone()) {
                        for dep in lookup.dependencies_of(&path) {
                            if !closure.contains(&dep) {
                                queue.push_back(dep);
                            }
                        }
                    }
                }
                debug!(
                    filter = %self.name,
                    roots = roots.len(),
                    closure = closure.len(),
                    "resolved dependency closure"
                );
                CompiledMatcher::Closure(closure)
            }
        };
        self.compiled = Some(compiled);
        Ok(())
    }

    /// Whether this filter matches the asset. Pure after `setup`; before
    /// setup it matches nothing.
    pub fn is_match(&self, ctx: &MatchContext<'_>) -> bool {
        let Some(compiled) = &self.compiled else {
            return false;
        };
        match compiled {
            CompiledMatcher::Globs(set) => set.is_match(ctx.asset.path.as_str()),
            CompiledMatcher::Types(types) => types.contains(&ctx.asset.asset_type),
            CompiledMatcher::Extensions(extensions) => ctx
                .asset
                .extension()
                .map(|ext| extensions.contains(&ext.to_ascii_lowercase()))
                .unwrap_or(false),
            CompiledMatcher::Address(regex) => ctx
                .current_address()
                .map(|address| regex.is_match(address))
                .unwrap_or(false),
            CompiledMatcher::Groups(groups) => ctx
                .current_group()
                .map(|group| groups.contains(group))
                .unwrap_or(false),
            CompiledMatcher::Paths(paths) => paths.contains(&ctx.asset.path),
            CompiledMatcher::Query(terms) => terms.iter().all(|term| term.matches(ctx.asset)),
            CompiledMatcher::Closure(closure) => closure.contains(&ctx.asset.path),
        }
    }

    /// Whether `setup` has run since the parameters last changed hands.
    pub fn is_ready(&self) -> bool {
        self.compiled.is_some()
    }

    fn require_non_empty<T>(&self, values: &[T], what: &'static str) -> Result<(), FilterError> {
        if values.is_empty() {
            return Err(FilterError::EmptyParameters {
                name: self.name.clone(),
                what,
            });
        }
        Ok(())
    }

    fn compile_glob(&self, pattern: &str) -> Result<Glob, FilterError> {
        GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| FilterError::InvalidGlob {
                name: self.name.clone(),
                pattern: pattern.to_string(),
                source,
            })
    }
}
