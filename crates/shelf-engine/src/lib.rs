//! # shelf-engine
//!
//! The resolution engine for Shelfmark.
//!
//! Given an inventory, a rule set, and the previous assignment snapshot,
//! the resolver computes every asset's address, labels, and version in a
//! single synchronous pass. The conflict detector scans resolved output
//! for duplicate or malformed addresses, and the preview helpers answer
//! "what would this rule do" without committing anything.

pub mod conflicts;
pub mod preview;
pub mod progress;
pub mod report;
pub mod resolver;

pub use conflicts::ConflictDetector;
pub use preview::{preview_rule, PreviewError, PreviewMatch, RulePreview};
pub use progress::{NoProgress, Progress, ProgressObserver};
pub use report::{ReportError, RunReport};
pub use resolver::{
    GenerationWarning, ProcessResult, ResolveError, ResolveOptions, Resolver, RunStats, RunStatus,
};
