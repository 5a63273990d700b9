//! Whole-corpus conflict detection.
//!
//! The scan runs over resolved output and reports findings; it never
//! rewrites an address. Duplicate and blank addresses are errors, odd
//! characters and boundary whitespace are warnings, and every finding
//! names the assets it touches plus a concrete fix.

use std::collections::BTreeMap;

use tracing::debug;

use shelf_core::address::{inspect, AddressIssue};
use shelf_core::{AssetRecord, AssignmentSnapshot, Conflict, ConflictKind, ResolvedAsset};
use shelf_rules::{Registry, RuleSet};

use crate::resolver::{ResolveError, Resolver};

/// Finds duplicate, malformed, and blank addresses in resolved output.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Scans a resolved inventory. Excluded assets and assets without an
    /// address are skipped.
    pub fn scan(resolved: &[ResolvedAsset]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let mut blank: Vec<String> = Vec::new();
        // BTreeMap keeps findings in a stable order across runs.
        let mut by_address: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for asset in resolved {
            if asset.excluded {
                continue;
            }
            let Some(address) = asset.address.as_deref() else {
                continue;
            };
            if address.trim().is_empty() {
                blank.push(asset.path.clone());
                continue;
            }
            by_address.entry(address).or_default().push(&asset.path);
        }

        if !blank.is_empty() {
            conflicts.push(Conflict::new(
                ConflictKind::BlankAddress,
                format!("{} asset(s) carry a blank address", blank.len()),
                blank,
                "point the matching address rules at a provider that produces a name",
            ));
        }

        for (address, paths) in &by_address {
            let affected = || paths.iter().map(|p| p.to_string()).collect::<Vec<_>>();

            for issue in inspect(address) {
                let conflict = match issue {
                    AddressIssue::ReservedChar(c) => Conflict::new(
                        ConflictKind::InvalidCharacter,
                        format!("address '{address}' contains reserved character '{c}'"),
                        affected(),
                        format!("remove '{c}' from the generated address"),
                    ),
                    AddressIssue::ControlChar => Conflict::new(
                        ConflictKind::InvalidCharacter,
                        format!("address '{address}' contains a control character"),
                        affected(),
                        "strip control characters from the generated address",
                    ),
                    AddressIssue::BoundaryWhitespace => Conflict::new(
                        ConflictKind::BoundaryWhitespace,
                        format!("address '{address}' has leading or trailing whitespace"),
                        affected(),
                        format!("trim the address to '{}'", address.trim()),
                    ),
                    // Blank addresses were collected separately above.
                    AddressIssue::Blank => continue,
                };
                conflicts.push(conflict);
            }

            if paths.len() >= 2 {
                conflicts.push(Conflict::new(
                    ConflictKind::DuplicateAddress,
                    format!("address '{address}' is assigned to {} assets", paths.len()),
                    affected(),
                    "make the winning providers distinguish these assets, or narrow the rule filters",
                ));
            }
        }

        debug!(findings = conflicts.len(), assets = resolved.len(), "conflict scan finished");
        conflicts
    }

    /// Runs the address pass in memory against a candidate rule set and
    /// reports the conflicts committing it would produce. No groups are
    /// created and nothing is persisted.
    pub fn preview(
        inventory: &[AssetRecord],
        snapshot: &AssignmentSnapshot,
        rule_set: &RuleSet,
        registry: &Registry,
    ) -> Result<Vec<Conflict>, ResolveError> {
        let resolved = Resolver::new(rule_set, registry).resolve_addresses(inventory, snapshot)?;
        Ok(Self::scan(&resolved))
    }
}
