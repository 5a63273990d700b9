//! Version range expressions.
//!
//! Two literal forms are accepted. A bare version `1.2.0` means "this
//! version or higher". An interval `[1.0.0,2.0.0)` uses `[`/`]` for
//! inclusive bounds and `(`/`)` for exclusive ones; either side may be
//! omitted to leave that end open, so `[1.0.0,)` and `(,2.0.0]` are both
//! valid. `Display` writes the canonical literal back out.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::semver::{SemanticVersion, VersionParseError};

/// Why a range expression failed to parse or build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("empty range expression")]
    Empty,
    #[error("range '{0}' must close with ']' or ')'")]
    Unterminated(String),
    #[error("range '{0}' must contain exactly one comma")]
    Malformed(String),
    #[error("invalid {bound} bound in '{input}': {source}")]
    InvalidBound {
        input: String,
        bound: &'static str,
        source: VersionParseError,
    },
    #[error("invalid version '{input}': {source}")]
    InvalidVersion {
        input: String,
        source: VersionParseError,
    },
    #[error("lower bound {min} is above upper bound {max}")]
    MinAboveMax { min: String, max: String },
}

/// A half-open, closed, or unbounded version interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionExpression {
    min: Option<SemanticVersion>,
    max: Option<SemanticVersion>,
    min_inclusive: bool,
    max_inclusive: bool,
}

impl VersionExpression {
    /// `version` or anything higher.
    pub fn at_least(version: SemanticVersion) -> Self {
        Self {
            min: Some(version),
            max: None,
            min_inclusive: true,
            max_inclusive: false,
        }
    }

    /// Exactly `version`, nothing else.
    pub fn exactly(version: SemanticVersion) -> Self {
        Self {
            min: Some(version.clone()),
            max: Some(version),
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// Builds an interval, rejecting a lower bound above the upper one.
    /// Both bounds open is legal and matches every version.
    pub fn bounded(
        min: Option<SemanticVersion>,
        max: Option<SemanticVersion>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Self, RangeError> {
        if let (Some(min), Some(max)) = (&min, &max) {
            if min > max {
                return Err(RangeError::MinAboveMax {
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
        }
        Ok(Self {
            min,
            max,
            min_inclusive,
            max_inclusive,
        })
    }

    /// Parses either literal form.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RangeError::Empty);
        }

        let min_inclusive = match trimmed.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => {
                let version = SemanticVersion::parse(trimmed).map_err(|source| {
                    RangeError::InvalidVersion {
                        input: trimmed.to_string(),
                        source,
                    }
                })?;
                return Ok(Self::at_least(version));
            }
        };

        let max_inclusive = match trimmed.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(RangeError::Unterminated(trimmed.to_string())),
        };
        if trimmed.len() < 2 {
            return Err(RangeError::Unterminated(trimmed.to_string()));
        }

        let inner = &trimmed[1..trimmed.len() - 1];
        let mut sides = inner.split(',');
        let (min_text, max_text) = match (sides.next(), sides.next(), sides.next()) {
            (Some(min), Some(max), None) => (min.trim(), max.trim()),
            _ => return Err(RangeError::Malformed(trimmed.to_string())),
        };

        let parse_bound = |text: &str, bound: &'static str| {
            if text.is_empty() {
                return Ok(None);
            }
            SemanticVersion::parse(text)
                .map(Some)
                .map_err(|source| RangeError::InvalidBound {
                    input: trimmed.to_string(),
                    bound,
                    source,
                })
        };

        let min = parse_bound(min_text, "lower")?;
        let max = parse_bound(max_text, "upper")?;
        Self::bounded(min, max, min_inclusive, max_inclusive)
    }

    /// Whether `version` falls inside this range. Each bound is applied
    /// independently; equality with an exclusive bound does not match.
    pub fn is_match(&self, version: &SemanticVersion) -> bool {
        if let Some(min) = &self.min {
            match version.cmp(min) {
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Equal if !self.min_inclusive => return false,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match version.cmp(max) {
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal if !self.max_inclusive => return false,
                _ => {}
            }
        }
        true
    }

    pub fn min(&self) -> Option<&SemanticVersion> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&SemanticVersion> {
        self.max.as_ref()
    }

    pub fn min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    pub fn max_inclusive(&self) -> bool {
        self.max_inclusive
    }
}

impl fmt::Display for VersionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // An inclusive lower bound with no upper bound is the bare form.
        if let (Some(min), None, true) = (&self.min, &self.max, self.min_inclusive) {
            return write!(f, "{min}");
        }
        write!(f, "{}", if self.min_inclusive { '[' } else { '(' })?;
        if let Some(min) = &self.min {
            write!(f, "{min}")?;
        }
        f.write_str(",")?;
        if let Some(max) = &self.max {
            write!(f, "{max}")?;
        }
        write!(f, "{}", if self.max_inclusive { ']' } else { ')' })
    }
}

impl FromStr for VersionExpression {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionExpression {
    type Error = RangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionExpression> for String {
    fn from(range: VersionExpression) -> Self {
        range.to_string()
    }
}
