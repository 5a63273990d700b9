//! # shelf-core
//!
//! Core data model for Shelfmark.
//!
//! This crate provides the asset inventory model, the current-assignment
//! snapshot, the resolved-asset output type, address validity checks,
//! semantic version and version range types, and the traits through which
//! the engine talks to its host (group store, dependency lookup).

pub mod address;
pub mod asset;
pub mod assignment;
pub mod collab;
pub mod conflict;
pub mod version;

pub use asset::{AssetRecord, FileInventory, InventorySource};
pub use assignment::{AssignedEntry, AssignmentSnapshot, ResolvedAsset};
pub use collab::{
    DependencyLookup, GroupHandle, GroupStore, MemoryDependencyMap, MemoryGroupStore,
};
pub use conflict::{Conflict, ConflictKind, ConflictSeverity};
pub use version::{RangeError, SemanticVersion, VersionExpression, VersionParseError};
