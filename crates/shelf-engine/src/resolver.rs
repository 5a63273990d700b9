//! The resolution pass.
//!
//! One run walks the inventory once and computes every asset's address,
//! labels, and version from the rule set. Address and version rules are
//! first-match-wins in priority order; label rules all apply and their
//! outputs union. Nothing is dropped silently: a matching rule whose
//! provider yields nothing becomes a warning attributed to that rule.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use shelf_core::{
    AssetRecord, AssignmentSnapshot, GroupStore, MemoryGroupStore, ResolvedAsset, SemanticVersion,
};
use shelf_rules::{
    evaluation_order, MatchContext, ProviderOutput, Registry, RuleCategory, RulePolicy, RuleSet,
    ValidationReport,
};

use crate::progress::{NoProgress, Progress, ProgressObserver};

/// Why a resolution run could not start.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("rule set failed validation:\n{0}")]
    Invalid(ValidationReport),
    #[error("filter '{0}' has not been set up")]
    FilterNotReady(String),
    #[error("provider '{0}' has not been set up")]
    ProviderNotReady(String),
}

/// A per-asset, per-rule problem observed during resolution. Warnings
/// never stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationWarning {
    /// A matching rule's provider produced nothing for this asset.
    EmptyProviderOutput {
        asset: String,
        rule: String,
        category: RuleCategory,
    },
    /// A version rule produced text that does not parse as a version.
    UnparsableVersion {
        asset: String,
        rule: String,
        version: String,
        reason: String,
    },
    /// A parsed version fell outside the rule set's version range. The
    /// asset keeps whatever version it carried into the run.
    VersionOutOfRange {
        asset: String,
        rule: String,
        version: String,
        range: String,
    },
}

impl fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationWarning::EmptyProviderOutput {
                asset,
                rule,
                category,
            } => write!(f, "rule '{rule}' produced empty {category} output for '{asset}'"),
            GenerationWarning::UnparsableVersion {
                asset,
                rule,
                version,
                reason,
            } => write!(
                f,
                "rule '{rule}' produced '{version}' for '{asset}', which is not a semantic version: {reason}"
            ),
            GenerationWarning::VersionOutOfRange {
                asset,
                rule,
                version,
                range,
            } => write!(
                f,
                "rule '{rule}' produced version {version} for '{asset}', outside the range {range}"
            ),
        }
    }
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every asset in the inventory was processed.
    Completed,
    /// The progress observer aborted the run; `processed` assets carry
    /// final values, the rest are absent from the result.
    Aborted { processed: usize },
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub assets_total: usize,
    pub assets_processed: usize,
    pub addresses_assigned: usize,
    /// Assets whose existing address a `skip_existing` rule left alone.
    pub addresses_kept: usize,
    /// Labels newly added across all assets.
    pub labels_assigned: usize,
    pub versions_assigned: usize,
    pub versions_kept: usize,
    /// Assets flagged for exclusion because they ended the run without a
    /// version while the rule set demands one.
    pub excluded: usize,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub status: RunStatus,
    pub resolved: Vec<ResolvedAsset>,
    pub warnings: Vec<GenerationWarning>,
    pub stats: RunStats,
}

/// Tunables for one run.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Progress observer call interval, in assets.
    pub progress_batch: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { progress_batch: 100 }
    }
}

/// Evaluates a rule set against an inventory.
///
/// The registry must be [set up](Registry::setup) before the first run.
/// A resolver borrows its configuration, so one rule set and registry
/// can back any number of runs.
pub struct Resolver<'a> {
    rule_set: &'a RuleSet,
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(rule_set: &'a RuleSet, registry: &'a Registry) -> Self {
        Self { rule_set, registry }
    }

    /// Resolves the whole inventory without progress reporting.
    pub fn resolve(
        &self,
        inventory: &[AssetRecord],
        snapshot: &AssignmentSnapshot,
        groups: &mut dyn GroupStore,
        options: &ResolveOptions,
    ) -> Result<ProcessResult, ResolveError> {
        self.resolve_with_progress(inventory, snapshot, groups, options, &mut NoProgress)
    }

    /// Resolves the whole inventory, reporting progress in batches. When
    /// the observer breaks, the partial result is returned with
    /// [`RunStatus::Aborted`] rather than discarded.
    pub fn resolve_with_progress(
        &self,
        inventory: &[AssetRecord],
        snapshot: &AssignmentSnapshot,
        groups: &mut dyn GroupStore,
        options: &ResolveOptions,
        observer: &mut dyn ProgressObserver,
    ) -> Result<ProcessResult, ResolveError> {
        // 1. Gate on structural validity and setup state.
        let report = self.rule_set.validate(self.registry);
        if report.has_errors() {
            return Err(ResolveError::Invalid(report));
        }
        self.check_ready()?;

        // 2. Fix the evaluation order once per category.
        let address_order = evaluation_order(self.rule_set.rules(RuleCategory::Address));
        let label_order = evaluation_order(self.rule_set.rules(RuleCategory::Label));
        let version_order = evaluation_order(self.rule_set.rules(RuleCategory::Version));

        debug!(
            assets = inventory.len(),
            rules = self.rule_set.rule_count(),
            "starting resolution"
        );

        let mut resolved = Vec::with_capacity(inventory.len());
        let mut warnings = Vec::new();
        let mut stats = RunStats {
            assets_total: inventory.len(),
            ..RunStats::default()
        };
        let batch = options.progress_batch.max(1);

        // 3. One pass over the inventory.
        for (index, asset) in inventory.iter().enumerate() {
            let current = snapshot.get(&asset.path);
            let ctx = MatchContext::new(asset, current);
            let mut out = ResolvedAsset::carry_over(&asset.path, current);

            self.apply_address_pass(
                asset,
                &ctx,
                &mut out,
                &address_order,
                groups,
                &mut warnings,
                &mut stats,
            );
            self.apply_label_pass(asset, &ctx, &mut out, &label_order, &mut warnings, &mut stats);
            self.apply_version_pass(
                asset,
                &ctx,
                &mut out,
                &version_order,
                &mut warnings,
                &mut stats,
            );

            if self.rule_set.exclude_unversioned && out.version.is_none() {
                out.excluded = true;
                stats.excluded += 1;
            }

            resolved.push(out);
            let done = index + 1;
            stats.assets_processed = done;

            if done % batch == 0 || done == inventory.len() {
                let progress = Progress::new(done, inventory.len());
                if observer.on_progress(&progress).is_break() {
                    warn!(processed = done, total = inventory.len(), "run aborted by observer");
                    return Ok(ProcessResult {
                        status: RunStatus::Aborted { processed: done },
                        resolved,
                        warnings,
                        stats,
                    });
                }
            }
        }

        info!(
            assets = stats.assets_processed,
            addresses = stats.addresses_assigned,
            labels = stats.labels_assigned,
            versions = stats.versions_assigned,
            warnings = warnings.len(),
            "resolution complete"
        );
        Ok(ProcessResult {
            status: RunStatus::Completed,
            resolved,
            warnings,
            stats,
        })
    }

    /// Runs only the address pass, against a throwaway group store.
    /// Backs conflict preview, which must not create real groups.
    pub fn resolve_addresses(
        &self,
        inventory: &[AssetRecord],
        snapshot: &AssignmentSnapshot,
    ) -> Result<Vec<ResolvedAsset>, ResolveError> {
        let report = self.rule_set.validate(self.registry);
        if report.has_errors() {
            return Err(ResolveError::Invalid(report));
        }
        self.check_ready()?;

        let order = evaluation_order(self.rule_set.rules(RuleCategory::Address));
        let mut groups = MemoryGroupStore::new();
        let mut warnings = Vec::new();
        let mut stats = RunStats::default();

        let mut resolved = Vec::with_capacity(inventory.len());
        for asset in inventory {
            let current = snapshot.get(&asset.path);
            let ctx = MatchContext::new(asset, current);
            let mut out = ResolvedAsset::carry_over(&asset.path, current);
            self.apply_address_pass(
                asset,
                &ctx,
                &mut out,
                &order,
                &mut groups,
                &mut warnings,
                &mut stats,
            );
            resolved.push(out);
        }
        Ok(resolved)
    }

    /// Every filter and provider an enabled rule references must have
    /// been set up; an unready one would silently match nothing.
    fn check_ready(&self) -> Result<(), ResolveError> {
        for rule in self.rule_set.iter_rules().filter(|rule| rule.enabled) {
            for name in &rule.filters {
                if let Some(filter) = self.registry.filter(name) {
                    if !filter.is_ready() {
                        return Err(ResolveError::FilterNotReady(name.clone()));
                    }
                }
            }
            if let Some(provider) = self.registry.provider(&rule.provider) {
                if !provider.is_ready() {
                    return Err(ResolveError::ProviderNotReady(rule.provider.clone()));
                }
            }
        }
        Ok(())
    }

    fn apply_address_pass(
        &self,
        asset: &AssetRecord,
        ctx: &MatchContext<'_>,
        out: &mut ResolvedAsset,
        order: &[usize],
        groups: &mut dyn GroupStore,
        warnings: &mut Vec<GenerationWarning>,
        stats: &mut RunStats,
    ) {
        let rules = self.rule_set.rules(RuleCategory::Address);
        for &idx in order {
            let rule = &rules[idx];
            if !self.registry.rule_matches(rule, ctx) {
                continue;
            }

            // First fully matching rule wins; later rules never run.
            let RulePolicy::Address {
                skip_existing,
                target_group,
            } = &rule.policy
            else {
                return;
            };

            if *skip_existing && out.address.is_some() {
                stats.addresses_kept += 1;
                return;
            }

            let Some(provider) = self.registry.provider(&rule.provider) else {
                return;
            };
            let output = provider.provide(&asset.path);
            if output.is_empty() {
                warnings.push(GenerationWarning::EmptyProviderOutput {
                    asset: asset.path.clone(),
                    rule: rule.name.clone(),
                    category: RuleCategory::Address,
                });
                return;
            }
            if let ProviderOutput::Address(address) = output {
                let handle = groups.obtain(target_group);
                out.address = Some(address);
                out.group = Some(handle.name);
                stats.addresses_assigned += 1;
            }
            return;
        }
    }

    fn apply_label_pass(
        &self,
        asset: &AssetRecord,
        ctx: &MatchContext<'_>,
        out: &mut ResolvedAsset,
        order: &[usize],
        warnings: &mut Vec<GenerationWarning>,
        stats: &mut RunStats,
    ) {
        let rules = self.rule_set.rules(RuleCategory::Label);
        let mut matched_any = false;
        let mut clear_existing = false;
        let mut gathered: Vec<String> = Vec::new();

        // Every matching label rule contributes; outputs union.
        for &idx in order {
            let rule = &rules[idx];
            if !self.registry.rule_matches(rule, ctx) {
                continue;
            }
            matched_any = true;

            if let RulePolicy::Label { append_to_existing } = &rule.policy {
                // One dissenting rule clears carried labels, applied
                // once no matter how many rules dissent.
                if !append_to_existing {
                    clear_existing = true;
                }
            }

            let Some(provider) = self.registry.provider(&rule.provider) else {
                continue;
            };
            let output = provider.provide(&asset.path);
            if output.is_empty() {
                warnings.push(GenerationWarning::EmptyProviderOutput {
                    asset: asset.path.clone(),
                    rule: rule.name.clone(),
                    category: RuleCategory::Label,
                });
                continue;
            }
            if let ProviderOutput::Labels(labels) = output {
                gathered.extend(labels);
            }
        }

        if !matched_any {
            return;
        }
        if clear_existing {
            out.labels.clear();
        }
        for label in gathered {
            if out.labels.insert(label) {
                stats.labels_assigned += 1;
            }
        }
    }

    fn apply_version_pass(
        &self,
        asset: &AssetRecord,
        ctx: &MatchContext<'_>,
        out: &mut ResolvedAsset,
        order: &[usize],
        warnings: &mut Vec<GenerationWarning>,
        stats: &mut RunStats,
    ) {
        let rules = self.rule_set.rules(RuleCategory::Version);
        for &idx in order {
            let rule = &rules[idx];
            if !self.registry.rule_matches(rule, ctx) {
                continue;
            }

            let RulePolicy::Version { skip_existing } = &rule.policy else {
                return;
            };
            if *skip_existing && out.version.is_some() {
                stats.versions_kept += 1;
                return;
            }

            let Some(provider) = self.registry.provider(&rule.provider) else {
                return;
            };
            let output = provider.provide(&asset.path);
            if output.is_empty() {
                warnings.push(GenerationWarning::EmptyProviderOutput {
                    asset: asset.path.clone(),
                    rule: rule.name.clone(),
                    category: RuleCategory::Version,
                });
                return;
            }
            let ProviderOutput::Version(raw) = output else {
                return;
            };

            let version = match SemanticVersion::parse(&raw) {
                Ok(version) => version,
                Err(err) => {
                    warnings.push(GenerationWarning::UnparsableVersion {
                        asset: asset.path.clone(),
                        rule: rule.name.clone(),
                        version: raw,
                        reason: err.to_string(),
                    });
                    return;
                }
            };

            if let Some(range) = &self.rule_set.version_range_filter {
                if !range.is_match(&version) {
                    // Rejected output is not applied; the carried
                    // version, if any, stands.
                    warnings.push(GenerationWarning::VersionOutOfRange {
                        asset: asset.path.clone(),
                        rule: rule.name.clone(),
                        version: version.to_string(),
                        range: range.to_string(),
                    });
                    return;
                }
            }

            out.version = Some(version.to_string());
            stats.versions_assigned += 1;
            return;
        }
    }
}
