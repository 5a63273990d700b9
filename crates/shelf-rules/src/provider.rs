//! Value providers.
//!
//! A provider turns an asset path into the value a rule assigns: an
//! address, a list of labels, or a version string. Each kind belongs to
//! exactly one rule category. `provide` never fails; output can be empty,
//! and the resolver reports empty output as a warning instead of applying
//! it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shelf_core::{asset, SemanticVersion};

use crate::context::SetupContext;
use crate::rule::RuleCategory;

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

/// Provider parameter payloads, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderKind {
    /// The file name, optionally keeping the extension.
    AddressFromFilename {
        #[serde(default)]
        include_extension: bool,
        #[serde(default)]
        to_lowercase: bool,
    },
    /// The full path, minus an optional prefix and the extension.
    AddressFromPath {
        #[serde(default)]
        strip_prefix: Option<String>,
        #[serde(default = "default_true")]
        strip_extension: bool,
        #[serde(default)]
        to_lowercase: bool,
    },
    /// The last `segments` folder names joined with `/`. Files with no
    /// folder produce empty output.
    AddressFromFolder {
        #[serde(default = "default_one")]
        segments: usize,
    },
    /// A fixed address. Useful with single-asset filters.
    ConstantAddress { value: String },
    /// A fixed label list.
    ConstantLabels { labels: Vec<String> },
    /// The first `depth` folder names as individual labels.
    LabelsFromFolders {
        #[serde(default = "default_one")]
        depth: usize,
    },
    /// The lowercased extension as a single label. Extension-less files
    /// produce empty output.
    LabelFromExtension,
    /// A fixed version.
    ConstantVersion { version: String },
    /// The first capture group of the regex, matched against the path.
    VersionFromPath { pattern: String },
    /// A value injected by the host at setup time, looked up by key.
    /// Keeps revision-control or build-counter versions out of `provide`.
    ExternalVersion { key: String },
}

impl ProviderKind {
    /// Stable kind name, matching the serde tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProviderKind::AddressFromFilename { .. } => "address_from_filename",
            ProviderKind::AddressFromPath { .. } => "address_from_path",
            ProviderKind::AddressFromFolder { .. } => "address_from_folder",
            ProviderKind::ConstantAddress { .. } => "constant_address",
            ProviderKind::ConstantLabels { .. } => "constant_labels",
            ProviderKind::LabelsFromFolders { .. } => "labels_from_folders",
            ProviderKind::LabelFromExtension => "label_from_extension",
            ProviderKind::ConstantVersion { .. } => "constant_version",
            ProviderKind::VersionFromPath { .. } => "version_from_path",
            ProviderKind::ExternalVersion { .. } => "external_version",
        }
    }

    /// The one rule category this kind can serve.
    pub fn category(&self) -> RuleCategory {
        match self {
            ProviderKind::AddressFromFilename { .. }
            | ProviderKind::AddressFromPath { .. }
            | ProviderKind::AddressFromFolder { .. }
            | ProviderKind::ConstantAddress { .. } => RuleCategory::Address,
            ProviderKind::ConstantLabels { .. }
            | ProviderKind::LabelsFromFolders { .. }
            | ProviderKind::LabelFromExtension => RuleCategory::Label,
            ProviderKind::ConstantVersion { .. }
            | ProviderKind::VersionFromPath { .. }
            | ProviderKind::ExternalVersion { .. } => RuleCategory::Version,
        }
    }
}

/// Why a provider's parameters are unusable.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{name}' has no {what}")]
    EmptyParameters { name: String, what: &'static str },
    #[error("provider '{name}': {what} must be at least 1")]
    ZeroCount { name: String, what: &'static str },
    #[error("provider '{name}': invalid regex '{pattern}': {source}")]
    InvalidRegex {
        name: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("provider '{name}': pattern '{pattern}' needs a capture group for the version text")]
    MissingCaptureGroup { name: String, pattern: String },
    #[error("provider '{name}': constant version '{version}' is not a semantic version: {source}")]
    InvalidConstantVersion {
        name: String,
        version: String,
        source: shelf_core::VersionParseError,
    },
    #[error("provider '{name}': no external value named '{key}' was supplied")]
    MissingExternalValue { name: String, key: String },
}

/// What a provider produced for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutput {
    Address(String),
    Labels(Vec<String>),
    Version(String),
}

impl ProviderOutput {
    /// True when there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        match self {
            ProviderOutput::Address(value) | ProviderOutput::Version(value) => value.is_empty(),
            ProviderOutput::Labels(labels) => labels.is_empty(),
        }
    }

    pub fn category(&self) -> RuleCategory {
        match self {
            ProviderOutput::Address(_) => RuleCategory::Address,
            ProviderOutput::Labels(_) => RuleCategory::Label,
            ProviderOutput::Version(_) => RuleCategory::Version,
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledProvider {
    VersionPattern(Regex),
    ExternalValue(String),
}

/// A named provider definition plus any compiled state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(flatten)]
    pub kind: ProviderKind,
    #[serde(skip)]
    compiled: Option<CompiledProvider>,
}

impl Provider {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            compiled: None,
        }
    }

    /// Checks the parameters. Constant versions must parse so that a typo
    /// surfaces here instead of as a per-asset warning on every run.
    pub fn validate(&self) -> Result<(), ProviderError> {
        match &self.kind {
            ProviderKind::ConstantAddress { value } => {
                if value.is_empty() {
                    return Err(ProviderError::EmptyParameters {
                        name: self.name.clone(),
                        what: "address value",
                    });
                }
                Ok(())
            }
            ProviderKind::ConstantLabels { labels } => {
                if labels.is_empty() || labels.iter().any(String::is_empty) {
                    return Err(ProviderError::EmptyParameters {
                        name: self.name.clone(),
                        what: "labels",
                    });
                }
                Ok(())
            }
            ProviderKind::AddressFromFolder { segments } => {
                if *segments == 0 {
                    return Err(ProviderError::ZeroCount {
                        name: self.name.clone(),
                        what: "segments",
                    });
                }
                Ok(())
            }
            ProviderKind::LabelsFromFolders { depth } => {
                if *depth == 0 {
                    return Err(ProviderError::ZeroCount {
                        name: self.name.clone(),
                        what: "depth",
                    });
                }
                Ok(())
            }
            ProviderKind::ConstantVersion { version } => {
                SemanticVersion::parse(version).map_err(|source| {
                    ProviderError::InvalidConstantVersion {
                        name: self.name.clone(),
                        version: version.clone(),
                        source,
                    }
                })?;
                Ok(())
            }
            ProviderKind::VersionFromPath { pattern } => {
                let regex = Regex::new(pattern).map_err(|source| ProviderError::InvalidRegex {
                    name: self.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                if regex.captures_len() < 2 {
                    return Err(ProviderError::MissingCaptureGroup {
                        name: self.name.clone(),
                        pattern: pattern.clone(),
                    });
                }
                Ok(())
            }
            ProviderKind::ExternalVersion { key } => {
                if key.is_empty() {
                    return Err(ProviderError::EmptyParameters {
                        name: self.name.clone(),
                        what: "key",
                    });
                }
                Ok(())
            }
            ProviderKind::AddressFromFilename { .. }
            | ProviderKind::AddressFromPath { .. }
            | ProviderKind::LabelFromExtension => Ok(()),
        }
    }

    /// Compiles the version pattern and resolves external values.
    /// Idempotent; external values are re-read from the context each call.
    pub fn setup(&mut self, ctx: &SetupContext) -> Result<(), ProviderError> {
        self.validate()?;
        self.compiled = match &self.kind {
            ProviderKind::VersionFromPath { pattern } => {
                let regex = Regex::new(pattern).map_err(|source| ProviderError::InvalidRegex {
                    name: self.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                Some(CompiledProvider::VersionPattern(regex))
            }
            ProviderKind::ExternalVersion { key } => {
                let value = ctx.external_value(key).ok_or_else(|| {
                    ProviderError::MissingExternalValue {
                        name: self.name.clone(),
                        key: key.clone(),
                    }
                })?;
                Some(CompiledProvider::ExternalValue(value.to_string()))
            }
            _ => None,
        };
        Ok(())
    }

    /// Produces the value for one path. Pure; the two compiled kinds fall
    /// back to empty output when `setup` has not run.
    pub fn provide(&self, path: &str) -> ProviderOutput {
        match &self.kind {
            ProviderKind::AddressFromFilename {
                include_extension,
                to_lowercase,
            } => {
                let base = if *include_extension {
                    asset::file_name(path)
                } else {
                    asset::file_stem(path)
                };
                ProviderOutput::Address(apply_case(base, *to_lowercase))
            }
            ProviderKind::AddressFromPath {
                strip_prefix,
                strip_extension,
                to_lowercase,
            } => {
                let mut base = path;
                if let Some(prefix) = strip_prefix {
                    if let Some(rest) = base.strip_prefix(prefix.as_str()) {
                        base = rest;
                    }
                }
                let mut address = base.to_string();
                if *strip_extension {
                    if let Some(ext_len) = asset::extension(&address).map(str::len) {
                        address.truncate(address.len() - ext_len - 1);
                    }
                }
                if *to_lowercase {
                    address = address.to_lowercase();
                }
                ProviderOutput::Address(address)
            }
            ProviderKind::AddressFromFolder { segments } => {
                let folders = asset::folder_segments(path);
                if folders.is_empty() {
                    return ProviderOutput::Address(String::new());
                }
                let take = (*segments).min(folders.len());
                ProviderOutput::Address(folders[folders.len() - take..].join("/"))
            }
            ProviderKind::ConstantAddress { value } => ProviderOutput::Address(value.clone()),
            ProviderKind::ConstantLabels { labels } => ProviderOutput::Labels(labels.clone()),
            ProviderKind::LabelsFromFolders { depth } => ProviderOutput::Labels(
                asset::folder_segments(path)
                    .into_iter()
                    .take(*depth)
                    .map(str::to_string)
                    .collect(),
            ),
            ProviderKind::LabelFromExtension => match asset::extension(path) {
                Some(ext) => ProviderOutput::Labels(vec![ext.to_ascii_lowercase()]),
                None => ProviderOutput::Labels(Vec::new()),
            },
            ProviderKind::ConstantVersion { version } => {
                ProviderOutput::Version(version.clone())
            }
            ProviderKind::VersionFromPath { .. } => {
                let version = match &self.compiled {
                    Some(CompiledProvider::VersionPattern(regex)) => regex
                        .captures(path)
                        .and_then(|captures| captures.get(1))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                ProviderOutput::Version(version)
            }
            ProviderKind::ExternalVersion { .. } => {
                let version = match &self.compiled {
                    Some(CompiledProvider::ExternalValue(value)) => value.clone(),
                    _ => String::new(),
                };
                ProviderOutput::Version(version)
            }
        }
    }

    /// Whether `provide` has everything it needs.
    pub fn is_ready(&self) -> bool {
        match &self.kind {
            ProviderKind::VersionFromPath { .. } | ProviderKind::ExternalVersion { .. } => {
                self.compiled.is_some()
            }
            _ => true,
        }
    }
}

fn apply_case(value: &str, to_lowercase: bool) -> String {
    if to_lowercase {
        value.to_lowercase()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(kind: ProviderKind) -> Provider {
        let mut provider = Provider::new("test", kind);
        provider.setup(&SetupContext::new()).unwrap();
        provider
    }

    #[test]
    fn test_address_from_filename() {
        let provider = ready(ProviderKind::AddressFromFilename {
            include_extension: false,
            to_lowercase: true,
        });
        assert_eq!(
            provider.provide("assets/Textures/Hero_01.PNG"),
            ProviderOutput::Address("hero_01".to_string())
        );

        let with_ext = ready(ProviderKind::AddressFromFilename {
            include_extension: true,
            to_lowercase: false,
        });
        assert_eq!(
            with_ext.provide("assets/Hero.png"),
            ProviderOutput::Address("Hero.png".to_string())
        );
    }

    #[test]
    fn test_address_from_path() {
        let provider = ready(ProviderKind::AddressFromPath {
            strip_prefix: Some("assets/".to_string()),
            strip_extension: true,
            to_lowercase: false,
        });
        assert_eq!(
            provider.provide("assets/textures/hero.png"),
            ProviderOutput::Address("textures/hero".to_string())
        );
        // A path outside the prefix keeps its full form.
        assert_eq!(
            provider.provide("shared/stone.mat"),
            ProviderOutput::Address("shared/stone".to_string())
        );
    }

    #[test]
    fn test_address_from_folder() {
        let provider = ready(ProviderKind::AddressFromFolder { segments: 2 });
        assert_eq!(
            provider.provide("assets/characters/hero/diffuse.png"),
            ProviderOutput::Address("characters/hero".to_string())
        );
        assert_eq!(
            provider.provide("hero.png"),
            ProviderOutput::Address(String::new())
        );
        // Fewer folders than requested uses what is there.
        assert_eq!(
            provider.provide("top/file.png"),
            ProviderOutput::Address("top".to_string())
        );
    }

    #[test]
    fn test_label_providers() {
        let constant = ready(ProviderKind::ConstantLabels {
            labels: vec!["ui".to_string(), "hud".to_string()],
        });
        assert_eq!(
            constant.provide("any.png"),
            ProviderOutput::Labels(vec!["ui".to_string(), "hud".to_string()])
        );

        let folders = ready(ProviderKind::LabelsFromFolders { depth: 2 });
        assert_eq!(
            folders.provide("assets/characters/hero/diffuse.png"),
            ProviderOutput::Labels(vec!["assets".to_string(), "characters".to_string()])
        );

        let extension = ready(ProviderKind::LabelFromExtension);
        assert_eq!(
            extension.provide("a/b.PNG"),
            ProviderOutput::Labels(vec!["png".to_string()])
        );
        assert!(extension.provide("a/README").is_empty());
    }

    #[test]
    fn test_version_providers() {
        let constant = ready(ProviderKind::ConstantVersion {
            version: "2.1.0".to_string(),
        });
        assert_eq!(
            constant.provide("any"),
            ProviderOutput::Version("2.1.0".to_string())
        );

        let from_path = ready(ProviderKind::VersionFromPath {
            pattern: r"/v(\d+\.\d+\.\d+)/".to_string(),
        });
        assert_eq!(
            from_path.provide("packs/v1.4.2/hero.png"),
            ProviderOutput::Version("1.4.2".to_string())
        );
        assert!(from_path.provide("packs/latest/hero.png").is_empty());
    }

    #[test]
    fn test_external_version() {
        let mut provider = Provider::new(
            "build",
            ProviderKind::ExternalVersion {
                key: "build_version".to_string(),
            },
        );
        let err = provider.setup(&SetupContext::new()).unwrap_err();
        assert!(matches!(err, ProviderError::MissingExternalValue { .. }));
        assert!(provider.provide("any").is_empty());

        provider
            .setup(&SetupContext::new().with_external_value("build_version", "0.9.1"))
            .unwrap();
        assert_eq!(
            provider.provide("any"),
            ProviderOutput::Version("0.9.1".to_string())
        );
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            ProviderKind::ConstantAddress {
                value: "x".to_string()
            }
            .category(),
            RuleCategory::Address
        );
        assert_eq!(
            ProviderKind::LabelFromExtension.category(),
            RuleCategory::Label
        );
        assert_eq!(
            ProviderKind::ExternalVersion {
                key: "k".to_string()
            }
            .category(),
            RuleCategory::Version
        );
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(matches!(
            Provider::new("p", ProviderKind::LabelsFromFolders { depth: 0 }).validate(),
            Err(ProviderError::ZeroCount { .. })
        ));
        assert!(matches!(
            Provider::new(
                "p",
                ProviderKind::ConstantVersion {
                    version: "one.two".to_string()
                }
            )
            .validate(),
            Err(ProviderError::InvalidConstantVersion { .. })
        ));
        assert!(matches!(
            Provider::new(
                "p",
                ProviderKind::VersionFromPath {
                    pattern: r"v\d+".to_string()
                }
            )
            .validate(),
            Err(ProviderError::MissingCaptureGroup { .. })
        ));
        assert!(matches!(
            Provider::new(
                "p",
                ProviderKind::ConstantLabels {
                    labels: vec!["ok".to_string(), String::new()]
                }
            )
            .validate(),
            Err(ProviderError::EmptyParameters { .. })
        ));
    }

    #[test]
    fn test_serde_shape() {
        let provider = Provider::new(
            "tex",
            ProviderKind::AddressFromPath {
                strip_prefix: Some("assets/".to_string()),
                strip_extension: true,
                to_lowercase: false,
            },
        );
        let json = serde_json::to_string(&provider).unwrap();
        assert!(json.contains("\"type\":\"address_from_path\""));

        let parsed: Provider = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, provider.kind);
    }

    #[test]
    fn test_defaults_in_deserialization() {
        let provider: Provider =
            serde_json::from_str(r#"{"name":"p","type":"address_from_path"}"#).unwrap();
        assert_eq!(
            provider.kind,
            ProviderKind::AddressFromPath {
                strip_prefix: None,
                strip_extension: true,
                to_lowercase: false,
            }
        );
    }
}
