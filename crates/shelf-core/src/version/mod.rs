//! Version identifiers and version range expressions.

pub mod range;
pub mod semver;

pub use range::{RangeError, VersionExpression};
pub use semver::{SemanticVersion, VersionParseError};
