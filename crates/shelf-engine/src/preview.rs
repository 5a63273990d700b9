//! Single-rule preview.
//!
//! Answers "which assets would this rule touch, and what would it
//! produce" without writing anything. The sample is bounded by the
//! caller; the match count is always taken over the full inventory so
//! a truncated sample never masquerades as the total.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shelf_core::{AssetRecord, AssignmentSnapshot};
use shelf_rules::{MatchContext, ProviderOutput, Registry, RuleCategory, RuleSet};

/// Why a preview could not run.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("no {category} rule named '{name}'")]
    UnknownRule { category: RuleCategory, name: String },
}

/// One sampled match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMatch {
    pub path: String,
    /// Rendered provider output; absent when the provider yields
    /// nothing for this asset.
    pub output: Option<String>,
}

/// What a single rule would do across an inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePreview {
    pub rule: String,
    pub category: RuleCategory,
    /// Matches across the whole inventory, regardless of sample size.
    pub total_matches: usize,
    pub sample: Vec<PreviewMatch>,
    pub sample_limit: usize,
}

/// Previews one rule against an inventory. The registry must be set up
/// first; a disabled rule previews as matching nothing, the same as in
/// a live run.
pub fn preview_rule(
    rule_set: &RuleSet,
    registry: &Registry,
    category: RuleCategory,
    rule_name: &str,
    inventory: &[AssetRecord],
    snapshot: &AssignmentSnapshot,
    sample_limit: usize,
) -> Result<RulePreview, PreviewError> {
    let rule = rule_set
        .rules(category)
        .iter()
        .find(|rule| rule.name == rule_name)
        .ok_or_else(|| PreviewError::UnknownRule {
            category,
            name: rule_name.to_string(),
        })?;

    let mut total_matches = 0;
    let mut sample = Vec::new();
    for asset in inventory {
        let ctx = MatchContext::new(asset, snapshot.get(&asset.path));
        if !registry.rule_matches(rule, &ctx) {
            continue;
        }
        total_matches += 1;
        if sample.len() < sample_limit {
            let output = registry
                .provider(&rule.provider)
                .map(|provider| provider.provide(&asset.path))
                .filter(|output| !output.is_empty())
                .map(render_output);
            sample.push(PreviewMatch {
                path: asset.path.clone(),
                output,
            });
        }
    }

    Ok(RulePreview {
        rule: rule.name.clone(),
        category,
        total_matches,
        sample,
        sample_limit,
    })
}

fn render_output(output: ProviderOutput) -> String {
    match output {
        ProviderOutput::Address(value) | ProviderOutput::Version(value) => value,
        ProviderOutput::Labels(labels) => labels.join(", "),
    }
}
