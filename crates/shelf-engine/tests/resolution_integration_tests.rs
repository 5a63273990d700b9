//! End-to-end resolution tests.
//!
//! These tests drive the full pipeline: registry setup, rule
//! evaluation, carry-over across runs, conflict scanning, and rule
//! document portability.

use shelf_core::{
    AssetRecord, AssignmentSnapshot, ConflictKind, MemoryGroupStore, VersionExpression,
};
use shelf_engine::{ConflictDetector, ProcessResult, ResolveOptions, Resolver, RunStatus};
use shelf_rules::{
    Filter, FilterKind, ImportMode, Provider, ProviderKind, Registry, Rule, RuleCategory,
    RuleExporter, RuleImporter, RulePolicy, RuleSet, SetupContext,
};

fn inventory() -> Vec<AssetRecord> {
    vec![
        AssetRecord::new("textures/env/Rock_Diffuse.png", "texture"),
        AssetRecord::new("textures/env/Rock_Normal.png", "texture"),
        AssetRecord::new("textures/char/Hero.png", "texture"),
        AssetRecord::new("models/Hero.fbx", "model"),
        AssetRecord::new("audio/theme.ogg", "audio"),
    ]
}

fn build_registry() -> Registry {
    let mut registry = Registry::new();
    registry.add_filter(Filter::new(
        "textures",
        FilterKind::PathGlob {
            patterns: vec!["textures/**".to_string()],
        },
    ));
    registry.add_filter(Filter::new(
        "models",
        FilterKind::PathGlob {
            patterns: vec!["models/**".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "texture-address",
        ProviderKind::AddressFromPath {
            strip_prefix: Some("textures/".to_string()),
            strip_extension: true,
            to_lowercase: true,
        },
    ));
    registry.add_provider(Provider::new(
        "model-address",
        ProviderKind::AddressFromFilename {
            include_extension: false,
            to_lowercase: true,
        },
    ));
    registry.add_provider(Provider::new(
        "top-folder",
        ProviderKind::LabelsFromFolders { depth: 1 },
    ));
    registry.add_provider(Provider::new(
        "pack-version",
        ProviderKind::ConstantVersion {
            version: "1.2.0".to_string(),
        },
    ));
    registry.setup(&SetupContext::new()).unwrap();
    registry
}

fn build_rule_set() -> RuleSet {
    let mut rule_set = RuleSet::new();
    rule_set.add_rule(
        Rule::builder(
            "texture-addresses",
            RulePolicy::Address {
                skip_existing: false,
                target_group: "textures".to_string(),
            },
        )
        .priority(10)
        .filter("textures")
        .provider("texture-address")
        .build(),
    );
    rule_set.add_rule(
        Rule::builder(
            "model-addresses",
            RulePolicy::Address {
                skip_existing: false,
                target_group: "models".to_string(),
            },
        )
        .filter("models")
        .provider("model-address")
        .build(),
    );
    rule_set.add_rule(
        Rule::builder(
            "folder-labels",
            RulePolicy::Label {
                append_to_existing: true,
            },
        )
        .filter("textures")
        .provider("top-folder")
        .build(),
    );
    rule_set.add_rule(
        Rule::builder(
            "pack-versions",
            RulePolicy::Version {
                skip_existing: false,
            },
        )
        .filter("textures")
        .provider("pack-version")
        .build(),
    );
    rule_set
}

fn run(rule_set: &RuleSet, registry: &Registry, snapshot: &AssignmentSnapshot) -> ProcessResult {
    let resolver = Resolver::new(rule_set, registry);
    let mut groups = MemoryGroupStore::new();
    resolver
        .resolve(&inventory(), snapshot, &mut groups, &ResolveOptions::default())
        .unwrap()
}

// =============================================================================
// Determinism and Idempotence
// =============================================================================

#[test]
fn test_repeated_runs_are_byte_identical() {
    let registry = build_registry();
    let rule_set = build_rule_set();
    let snapshot = AssignmentSnapshot::new();

    let first = run(&rule_set, &registry, &snapshot);
    let second = run(&rule_set, &registry, &snapshot);

    assert_eq!(first.resolved, second.resolved);
    assert_eq!(
        serde_json::to_string(&first.resolved).unwrap(),
        serde_json::to_string(&second.resolved).unwrap(),
        "two runs over the same inputs must serialize identically"
    );
}

#[test]
fn test_recommit_with_skip_existing_changes_nothing() {
    let registry = build_registry();
    let mut rule_set = build_rule_set();
    rule_set
        .rule_mut(RuleCategory::Address, "texture-addresses")
        .unwrap()
        .policy = RulePolicy::Address {
        skip_existing: true,
        target_group: "textures".to_string(),
    };
    rule_set
        .rule_mut(RuleCategory::Address, "model-addresses")
        .unwrap()
        .policy = RulePolicy::Address {
        skip_existing: true,
        target_group: "models".to_string(),
    };
    rule_set
        .rule_mut(RuleCategory::Version, "pack-versions")
        .unwrap()
        .policy = RulePolicy::Version {
        skip_existing: true,
    };

    let first = run(&rule_set, &registry, &AssignmentSnapshot::new());
    let committed = AssignmentSnapshot::absorb(&first.resolved);
    let second = run(&rule_set, &registry, &committed);

    assert_eq!(
        first.resolved, second.resolved,
        "a second run over committed state must be a no-op"
    );
    assert_eq!(second.stats.addresses_assigned, 0);
    assert_eq!(second.stats.addresses_kept, 4);
    assert_eq!(second.stats.versions_assigned, 0);
    assert_eq!(second.stats.labels_assigned, 0);
}

// =============================================================================
// Priority and Tie-breaking
// =============================================================================

#[test]
fn test_equal_priority_ties_break_on_declaration_order() {
    let mut registry = Registry::new();
    registry.add_filter(Filter::new(
        "all",
        FilterKind::PathGlob {
            patterns: vec!["**".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "first",
        ProviderKind::ConstantAddress {
            value: "from-first".to_string(),
        },
    ));
    registry.add_provider(Provider::new(
        "second",
        ProviderKind::ConstantAddress {
            value: "from-second".to_string(),
        },
    ));
    registry.setup(&SetupContext::new()).unwrap();

    for priority in [-5, 0, 7] {
        let mut rule_set = RuleSet::new();
        rule_set.add_rule(
            Rule::builder(
                "rule-a",
                RulePolicy::Address {
                    skip_existing: false,
                    target_group: "g".to_string(),
                },
            )
            .priority(priority)
            .filter("all")
            .provider("first")
            .build(),
        );
        rule_set.add_rule(
            Rule::builder(
                "rule-b",
                RulePolicy::Address {
                    skip_existing: false,
                    target_group: "g".to_string(),
                },
            )
            .priority(priority)
            .filter("all")
            .provider("second")
            .build(),
        );

        let resolver = Resolver::new(&rule_set, &registry);
        let mut groups = MemoryGroupStore::new();
        let result = resolver
            .resolve(
                &[AssetRecord::new("a.png", "file")],
                &AssignmentSnapshot::new(),
                &mut groups,
                &ResolveOptions::default(),
            )
            .unwrap();

        assert_eq!(
            result.resolved[0].address.as_deref(),
            Some("from-first"),
            "declaration order must break the tie at priority {priority}"
        );
    }
}

// =============================================================================
// Label Semantics
// =============================================================================

#[test]
fn test_label_rules_union_their_outputs() {
    let mut registry = Registry::new();
    registry.add_filter(Filter::new(
        "all",
        FilterKind::PathGlob {
            patterns: vec!["**".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "tag-x",
        ProviderKind::ConstantLabels {
            labels: vec!["x".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "tag-y",
        ProviderKind::ConstantLabels {
            labels: vec!["y".to_string()],
        },
    ));
    registry.setup(&SetupContext::new()).unwrap();

    let mut rule_set = RuleSet::new();
    for (name, provider) in [("labels-x", "tag-x"), ("labels-y", "tag-y")] {
        rule_set.add_rule(
            Rule::builder(
                name,
                RulePolicy::Label {
                    append_to_existing: true,
                },
            )
            .filter("all")
            .provider(provider)
            .build(),
        );
    }

    let resolver = Resolver::new(&rule_set, &registry);
    let mut groups = MemoryGroupStore::new();
    let result = resolver
        .resolve(
            &[AssetRecord::new("a.png", "file")],
            &AssignmentSnapshot::new(),
            &mut groups,
            &ResolveOptions::default(),
        )
        .unwrap();

    let labels: Vec<&str> = result.resolved[0].labels.iter().map(String::as_str).collect();
    assert_eq!(labels, vec!["x", "y"]);
}

#[test]
fn test_one_dissenting_label_rule_clears_carried_labels() {
    let mut registry = Registry::new();
    registry.add_filter(Filter::new(
        "all",
        FilterKind::PathGlob {
            patterns: vec!["**".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "tag-x",
        ProviderKind::ConstantLabels {
            labels: vec!["x".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "tag-y",
        ProviderKind::ConstantLabels {
            labels: vec!["y".to_string()],
        },
    ));
    registry.setup(&SetupContext::new()).unwrap();

    // The dissenting rule is declared second; declaration order must not
    // matter for the clear.
    let mut rule_set = RuleSet::new();
    rule_set.add_rule(
        Rule::builder(
            "labels-x",
            RulePolicy::Label {
                append_to_existing: true,
            },
        )
        .filter("all")
        .provider("tag-x")
        .build(),
    );
    rule_set.add_rule(
        Rule::builder(
            "labels-y",
            RulePolicy::Label {
                append_to_existing: false,
            },
        )
        .filter("all")
        .provider("tag-y")
        .build(),
    );

    let mut snapshot = AssignmentSnapshot::new();
    let mut entry = shelf_core::AssignedEntry::default();
    entry.labels.insert("old".to_string());
    snapshot.insert("a.png", entry);

    let resolver = Resolver::new(&rule_set, &registry);
    let mut groups = MemoryGroupStore::new();
    let result = resolver
        .resolve(
            &[AssetRecord::new("a.png", "file")],
            &snapshot,
            &mut groups,
            &ResolveOptions::default(),
        )
        .unwrap();

    let labels: Vec<&str> = result.resolved[0].labels.iter().map(String::as_str).collect();
    assert_eq!(labels, vec!["x", "y"], "carried labels must be gone, both outputs kept");
}

// =============================================================================
// Version Range Gate
// =============================================================================

#[test]
fn test_global_range_rejects_out_of_range_versions() {
    let mut registry = build_registry();
    registry.add_provider(Provider::new(
        "pack-version",
        ProviderKind::ConstantVersion {
            version: "2.5.0".to_string(),
        },
    ));
    registry.setup(&SetupContext::new()).unwrap();

    let mut rule_set = build_rule_set();
    rule_set.version_range_filter = Some(VersionExpression::parse("[1.0.0,2.0.0)").unwrap());

    let result = run(&rule_set, &registry, &AssignmentSnapshot::new());

    for asset in &result.resolved {
        assert_eq!(asset.version, None);
    }
    assert_eq!(result.stats.versions_assigned, 0);
    assert_eq!(
        result.warnings.len(),
        3,
        "each matching texture should produce one out-of-range warning"
    );
}

// =============================================================================
// Conflict Detection
// =============================================================================

#[test]
fn test_full_run_then_scan_finds_duplicates() {
    let mut registry = Registry::new();
    registry.add_filter(Filter::new(
        "all",
        FilterKind::PathGlob {
            patterns: vec!["**".to_string()],
        },
    ));
    registry.add_provider(Provider::new(
        "collide",
        ProviderKind::ConstantAddress {
            value: "same-name".to_string(),
        },
    ));
    registry.setup(&SetupContext::new()).unwrap();

    let mut rule_set = RuleSet::new();
    rule_set.add_rule(
        Rule::builder(
            "addr",
            RulePolicy::Address {
                skip_existing: false,
                target_group: "g".to_string(),
            },
        )
        .filter("all")
        .provider("collide")
        .build(),
    );

    let assets = [
        AssetRecord::new("a.png", "file"),
        AssetRecord::new("b.png", "file"),
    ];
    let resolver = Resolver::new(&rule_set, &registry);
    let mut groups = MemoryGroupStore::new();
    let result = resolver
        .resolve(&assets, &AssignmentSnapshot::new(), &mut groups, &ResolveOptions::default())
        .unwrap();

    let conflicts = ConflictDetector::scan(&result.resolved);
    assert_eq!(conflicts.len(), 1, "exactly one finding for one collision");
    assert_eq!(conflicts[0].kind, ConflictKind::DuplicateAddress);
    assert_eq!(conflicts[0].affected_assets, vec!["a.png", "b.png"]);
}

// =============================================================================
// Document Portability
// =============================================================================

#[test]
fn test_exported_document_reproduces_resolution_elsewhere() {
    let registry = build_registry();
    let rule_set = build_rule_set();

    let document = RuleExporter::export(&rule_set, &registry).unwrap();
    let json = RuleExporter::to_json(&document).unwrap();
    let restored = RuleExporter::from_json(&json).unwrap();

    // The receiving side has the same registry definitions but an empty
    // rule set.
    let mut imported_set = RuleSet::new();
    let report =
        RuleImporter::import(&restored, &mut imported_set, &registry, ImportMode::Replace)
            .unwrap();
    assert!(report.is_complete(), "every rule should resolve: {:?}", report.failed);

    let original = run(&rule_set, &registry, &AssignmentSnapshot::new());
    let roundtripped = run(&imported_set, &registry, &AssignmentSnapshot::new());
    assert_eq!(original.resolved, roundtripped.resolved);
}

// =============================================================================
// Structural Gates
// =============================================================================

#[test]
fn test_filterless_rule_blocks_the_run() {
    let registry = build_registry();
    let mut rule_set = build_rule_set();
    rule_set.add_rule(Rule::new(
        "no-filters",
        RulePolicy::Address {
            skip_existing: false,
            target_group: "g".to_string(),
        },
    ));

    let resolver = Resolver::new(&rule_set, &registry);
    let mut groups = MemoryGroupStore::new();
    let err = resolver
        .resolve(
            &inventory(),
            &AssignmentSnapshot::new(),
            &mut groups,
            &ResolveOptions::default(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("no filters"));
}

#[test]
fn test_complete_pipeline_assigns_groups_and_versions() {
    let registry = build_registry();
    let rule_set = build_rule_set();

    let resolver = Resolver::new(&rule_set, &registry);
    let mut groups = MemoryGroupStore::new();
    let result = resolver
        .resolve(
            &inventory(),
            &AssignmentSnapshot::new(),
            &mut groups,
            &ResolveOptions::default(),
        )
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);

    let by_path = |path: &str| {
        result
            .resolved
            .iter()
            .find(|asset| asset.path == path)
            .unwrap()
    };

    let rock = by_path("textures/env/Rock_Diffuse.png");
    assert_eq!(rock.address.as_deref(), Some("env/rock_diffuse"));
    assert_eq!(rock.group.as_deref(), Some("textures"));
    assert!(rock.labels.contains("textures"));
    assert_eq!(rock.version.as_deref(), Some("1.2.0"));

    let model = by_path("models/Hero.fbx");
    assert_eq!(model.address.as_deref(), Some("hero"));
    assert_eq!(model.group.as_deref(), Some("models"));
    assert!(model.version.is_none());

    let audio = by_path("audio/theme.ogg");
    assert!(audio.address.is_none(), "no rule matches audio assets");

    assert_eq!(groups.created(), ["textures".to_string(), "models".to_string()]);
    assert_eq!(result.stats.addresses_assigned, 4);
    assert_eq!(result.stats.versions_assigned, 3);
}
