//! Input file loading for the CLI.
//!
//! Wraps the JSON inputs a run needs (inventory, snapshot, dependency
//! map) and the `KEY=VALUE` external values. I/O failures are fatal;
//! malformed content is a user error and exits with the validation
//! code instead.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use shelf_core::{AssetRecord, AssignmentSnapshot, FileInventory, MemoryDependencyMap};

/// Why an input could not be used.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {what} file {path}: {source}")]
    Io {
        what: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[error("{what} file {path} is not valid JSON: {source}")]
    Parse {
        what: &'static str,
        path: String,
        source: serde_json::Error,
    },
    #[error("external value '{value}' is not KEY=VALUE")]
    MalformedExternal { value: String },
}

impl InputError {
    /// Fatal inputs abort the process; the rest are user errors.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InputError::Io { .. })
    }
}

fn read_file(what: &'static str, path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::Io {
        what,
        path: path.display().to_string(),
        source,
    })
}

/// Loads an inventory file: `{"assets": [{"path": ..., "type": ...}]}`.
pub fn read_inventory(path: &Path) -> Result<Vec<AssetRecord>, InputError> {
    let raw = read_file("inventory", path)?;
    let inventory = FileInventory::from_json(&raw).map_err(|source| InputError::Parse {
        what: "inventory",
        path: path.display().to_string(),
        source,
    })?;
    Ok(inventory.assets)
}

/// Loads a current-assignment snapshot, or an empty one when no path
/// was given.
pub fn read_snapshot(path: Option<&Path>) -> Result<AssignmentSnapshot, InputError> {
    let Some(path) = path else {
        return Ok(AssignmentSnapshot::new());
    };
    let raw = read_file("snapshot", path)?;
    AssignmentSnapshot::from_json(&raw).map_err(|source| InputError::Parse {
        what: "snapshot",
        path: path.display().to_string(),
        source,
    })
}

/// Loads a dependency map file: `{"edges": {"asset/path": ["dep/one", ...]}}`.
pub fn read_dependencies(path: &Path) -> Result<MemoryDependencyMap, InputError> {
    let raw = read_file("dependency map", path)?;
    MemoryDependencyMap::from_json(&raw).map_err(|source| InputError::Parse {
        what: "dependency map",
        path: path.display().to_string(),
        source,
    })
}

/// Parses repeated `--external KEY=VALUE` arguments. Later duplicates
/// of a key win.
pub fn parse_external_values(values: &[String]) -> Result<HashMap<String, String>, InputError> {
    let mut parsed = HashMap::new();
    for value in values {
        let Some((key, rest)) = value.split_once('=') else {
            return Err(InputError::MalformedExternal {
                value: value.clone(),
            });
        };
        if key.is_empty() {
            return Err(InputError::MalformedExternal {
                value: value.clone(),
            });
        }
        parsed.insert(key.to_string(), rest.to_string());
    }
    Ok(parsed)
}
