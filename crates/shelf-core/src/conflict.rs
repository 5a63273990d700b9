//! Conflict findings from the address scan.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a conflict is. Errors make the resolved output unusable;
/// warnings are survivable but worth fixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Warning,
    Error,
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictSeverity::Warning => write!(f, "warning"),
            ConflictSeverity::Error => write!(f, "error"),
        }
    }
}

/// Kinds of conflicts the scan can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The same address resolved for two or more assets.
    DuplicateAddress,
    /// A reserved or control character in an address.
    InvalidCharacter,
    /// Leading or trailing whitespace in an address.
    BoundaryWhitespace,
    /// An empty or whitespace-only address.
    BlankAddress,
}

impl ConflictKind {
    pub fn severity(&self) -> ConflictSeverity {
        match self {
            ConflictKind::DuplicateAddress | ConflictKind::BlankAddress => ConflictSeverity::Error,
            ConflictKind::InvalidCharacter | ConflictKind::BoundaryWhitespace => {
                ConflictSeverity::Warning
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DuplicateAddress => "duplicate_address",
            ConflictKind::InvalidCharacter => "invalid_character",
            ConflictKind::BoundaryWhitespace => "boundary_whitespace",
            ConflictKind::BlankAddress => "blank_address",
        }
    }
}

/// One finding from the conflict scan, with the assets it touches and a
/// concrete suggestion for fixing it. Findings are advisory; the scan
/// never rewrites anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
    pub affected_assets: Vec<String>,
    pub suggestion: String,
}

impl Conflict {
    pub fn new(
        kind: ConflictKind,
        message: impl Into<String>,
        affected_assets: Vec<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            affected_assets,
            suggestion: suggestion.into(),
        }
    }

    pub fn severity(&self) -> ConflictSeverity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == ConflictSeverity::Error
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity(), self.message)
    }
}
