//! Asset inventory model.
//!
//! Inventory paths are project-relative and use `/` as the separator on
//! every platform. The path helpers in this module operate on that logical
//! form directly instead of going through `std::path`, so matching and
//! address generation behave identically everywhere.

use serde::{Deserialize, Serialize};

/// A single file in the inventory: a path plus a host-assigned type tag.
///
/// Records are supplied by the host and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Project-relative path, `/`-separated.
    pub path: String,
    /// Type tag, e.g. `"texture"` or `"audio_clip"`.
    #[serde(rename = "type")]
    pub asset_type: String,
}

impl AssetRecord {
    pub fn new(path: impl Into<String>, asset_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            asset_type: asset_type.into(),
        }
    }

    /// Last path segment, including any extension.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    /// Last path segment without its final extension.
    pub fn file_stem(&self) -> &str {
        file_stem(&self.path)
    }

    /// Extension after the final dot, without the dot.
    pub fn extension(&self) -> Option<&str> {
        extension(&self.path)
    }
}

/// Last segment of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Last segment without its final extension. A leading dot does not count
/// as an extension separator, so `.config` stays `.config`.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Extension after the final dot of the last segment, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Folder segments above the file, outermost first. Empty segments from
/// doubled separators are dropped.
pub fn folder_segments(path: &str) -> Vec<&str> {
    match path.rsplit_once('/') {
        Some((folders, _)) => folders.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    }
}

/// The flat inventory document the engine resolves against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInventory {
    pub assets: Vec<AssetRecord>,
}

impl FileInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, asset: AssetRecord) {
        self.assets.push(asset);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Source of inventory contents. Hosts implement this over whatever store
/// actually enumerates their files; resolution itself only ever sees the
/// returned records.
pub trait InventorySource {
    /// The full inventory. Resolution preserves the returned order.
    fn assets(&self) -> Vec<AssetRecord>;
}

impl InventorySource for FileInventory {
    fn assets(&self) -> Vec<AssetRecord> {
        self.assets.clone()
    }
}
