//! Semantic version identifiers.
//!
//! `major.minor.patch` with an optional `-pre.release` suffix. Ordering
//! follows semver 2.0 precedence: the numeric triple first, then a
//! pre-release version sorts below its release, and pre-release
//! identifiers compare dot by dot with numeric identifiers below
//! alphanumeric ones. Build metadata after `+` is accepted on parse and
//! discarded; it never affects precedence.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a version string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("empty version string")]
    Empty,
    #[error("expected three dot-separated parts in '{0}'")]
    WrongPartCount(String),
    #[error("invalid numeric component '{part}' in '{input}'")]
    InvalidNumber { input: String, part: String },
    #[error("empty pre-release identifier in '{0}'")]
    EmptyPreReleaseIdent(String),
}

/// A parsed `major.minor.patch[-pre]` version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Raw pre-release text after the `-`, e.g. `"rc.2"`.
    pub pre_release: Option<String>,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
        }
    }

    pub fn with_pre_release(mut self, pre_release: impl Into<String>) -> Self {
        self.pre_release = Some(pre_release.into());
        self
    }

    /// Parses a version string. Leading zeros in numeric components are
    /// tolerated and compare by value.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        // Build metadata carries no precedence; drop it up front.
        let without_build = match trimmed.split_once('+') {
            Some((version, _)) => version,
            None => trimmed,
        };

        let (core, pre_release) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionParseError::WrongPartCount(input.trim().to_string()));
        }

        let parse_part = |part: &str| -> Result<u64, VersionParseError> {
            part.parse::<u64>()
                .map_err(|_| VersionParseError::InvalidNumber {
                    input: input.trim().to_string(),
                    part: part.to_string(),
                })
        };

        let pre_release = match pre_release {
            Some(pre) => {
                if pre.split('.').any(str::is_empty) {
                    return Err(VersionParseError::EmptyPreReleaseIdent(
                        input.trim().to_string(),
                    ));
                }
                Some(pre.to_string())
            }
            None => None,
        };

        Ok(Self {
            major: parse_part(parts[0])?,
            minor: parse_part(parts[1])?,
            patch: parse_part(parts[2])?,
            pre_release,
        })
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemanticVersion> for String {
    fn from(version: SemanticVersion) -> Self {
        version.to_string()
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| {
                compare_pre_release(self.pre_release.as_deref(), other.pre_release.as_deref())
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_pre_release(left: Option<&str>, right: Option<&str>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => {
            let mut left_idents = left.split('.');
            let mut right_idents = right.split('.');
            loop {
                match (left_idents.next(), right_idents.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(l), Some(r)) => {
                        let ord = compare_identifier(l, r);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
            }
        }
    }
}

fn compare_identifier(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}
