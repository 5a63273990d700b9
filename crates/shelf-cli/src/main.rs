//! Shelfmark CLI
//!
//! Command-line interface for the Shelfmark classification engine.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

mod inputs;

use shelf_core::{Conflict, ConflictSeverity, MemoryDependencyMap, MemoryGroupStore};
use shelf_engine::{
    preview_rule, ConflictDetector, Progress, ProgressObserver, ResolveOptions, Resolver,
    RunReport, RunStatus,
};
use shelf_rules::{
    load_rules, save_rules, ConfigError, ImportMode, ImportReport, LoadedRules, Registry,
    RuleCategory, RuleExporter, RuleImporter, SetupContext,
};

#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(version)]
#[command(
    about = "Declarative classification and metadata assignment for file inventories",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an inventory against a rules file
    Resolve {
        /// Rules file (YAML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Inventory file (JSON)
        #[arg(short, long, value_name = "FILE")]
        inventory: PathBuf,

        /// Current-assignment snapshot (JSON)
        #[arg(short, long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Dependency map (JSON), required by dependency_closure filters
        #[arg(short, long, value_name = "FILE")]
        dependencies: Option<PathBuf>,

        /// External provider value (repeatable)
        #[arg(short, long, value_name = "KEY=VALUE")]
        external: Vec<String>,

        /// Write the full JSON run report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Progress callback interval, in assets
        #[arg(long, default_value = "100")]
        progress_batch: usize,
    },

    /// Scan for address conflicts without committing anything
    Check {
        /// Rules file (YAML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Inventory file (JSON)
        #[arg(short, long, value_name = "FILE")]
        inventory: PathBuf,

        /// Current-assignment snapshot (JSON)
        #[arg(short, long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Dependency map (JSON), required by dependency_closure filters
        #[arg(short, long, value_name = "FILE")]
        dependencies: Option<PathBuf>,

        /// External provider value (repeatable)
        #[arg(short, long, value_name = "KEY=VALUE")]
        external: Vec<String>,
    },

    /// Preview what one rule would match and produce
    Preview {
        /// Rule name
        rule: String,

        /// Rule category (address, label, version)
        #[arg(short, long)]
        category: RuleCategory,

        /// Rules file (YAML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Inventory file (JSON)
        #[arg(short, long, value_name = "FILE")]
        inventory: PathBuf,

        /// Current-assignment snapshot (JSON)
        #[arg(short, long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Dependency map (JSON), required by dependency_closure filters
        #[arg(short, long, value_name = "FILE")]
        dependencies: Option<PathBuf>,

        /// External provider value (repeatable)
        #[arg(short, long, value_name = "KEY=VALUE")]
        external: Vec<String>,

        /// Maximum sampled matches to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Validate a rules file
    Validate {
        /// Rules file (YAML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,
    },

    /// Export rules as a portable rule document
    Export {
        /// Rules file (YAML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Destination file; stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Import a portable rule document into a rules file
    Import {
        /// Target rules file (YAML)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Rule document to import (JSON)
        #[arg(short, long, value_name = "FILE")]
        document: PathBuf,

        /// Import mode (replace, merge)
        #[arg(short, long, default_value = "merge")]
        mode: ImportMode,

        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Write the merged rules here instead of back to --rules
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

struct ResolveArgs {
    rules: PathBuf,
    inventory: PathBuf,
    snapshot: Option<PathBuf>,
    dependencies: Option<PathBuf>,
    external: Vec<String>,
    report: Option<PathBuf>,
    progress_batch: usize,
}

struct CheckArgs {
    rules: PathBuf,
    inventory: PathBuf,
    snapshot: Option<PathBuf>,
    dependencies: Option<PathBuf>,
    external: Vec<String>,
}

struct PreviewArgs {
    rule: String,
    category: RuleCategory,
    rules: PathBuf,
    inventory: PathBuf,
    snapshot: Option<PathBuf>,
    dependencies: Option<PathBuf>,
    external: Vec<String>,
    limit: usize,
}

struct ImportArgs {
    rules: PathBuf,
    document: PathBuf,
    mode: ImportMode,
    dry_run: bool,
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    shelf_observability::logging::init_logging_with_config(
        shelf_observability::logging::LoggingConfig {
            level: log_level,
            ..Default::default()
        },
    );

    let format = cli.format;
    let result = match cli.command {
        Commands::Resolve {
            rules,
            inventory,
            snapshot,
            dependencies,
            external,
            report,
            progress_batch,
        } => cmd_resolve(
            ResolveArgs {
                rules,
                inventory,
                snapshot,
                dependencies,
                external,
                report,
                progress_batch,
            },
            format,
        ),
        Commands::Check {
            rules,
            inventory,
            snapshot,
            dependencies,
            external,
        } => cmd_check(
            CheckArgs {
                rules,
                inventory,
                snapshot,
                dependencies,
                external,
            },
            format,
        ),
        Commands::Preview {
            rule,
            category,
            rules,
            inventory,
            snapshot,
            dependencies,
            external,
            limit,
        } => cmd_preview(
            PreviewArgs {
                rule,
                category,
                rules,
                inventory,
                snapshot,
                dependencies,
                external,
                limit,
            },
            format,
        ),
        Commands::Validate { rules } => cmd_validate(&rules),
        Commands::Export { rules, output } => cmd_export(&rules, output),
        Commands::Import {
            rules,
            document,
            mode,
            dry_run,
            output,
        } => cmd_import(ImportArgs {
            rules,
            document,
            mode,
            dry_run,
            output,
        }),
    };

    if let Err(err) = result {
        eprintln!("{}: {err:#}", "Error".red().bold());
        std::process::exit(2);
    }
}

/// Loads and validates a rules file. Unreadable files are fatal;
/// invalid content exits with the validation code.
fn load_rules_file(path: &Path) -> Result<LoadedRules> {
    match load_rules(path) {
        Ok(loaded) => Ok(loaded),
        Err(ConfigError::Io(source)) => Err(anyhow::Error::from(source)
            .context(format!("failed to read rules file {}", path.display()))),
        Err(err) => {
            println!("{}: {}", "Rules file error".red().bold(), err);
            std::process::exit(1);
        }
    }
}

/// Unwraps a loaded input. Read failures are fatal; malformed content
/// exits with the validation code.
fn load_input<T>(result: Result<T, inputs::InputError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            println!("{}: {}", "Input error".red().bold(), err);
            std::process::exit(1);
        }
    }
}

/// Compiles all filters and providers against the run's collaborators.
fn setup_registry(
    registry: &mut Registry,
    dependencies: Option<MemoryDependencyMap>,
    external: HashMap<String, String>,
) {
    let mut ctx = SetupContext::new().with_external_values(external);
    if let Some(map) = dependencies {
        ctx = ctx.with_dependencies(map);
    }
    if let Err(err) = registry.setup(&ctx) {
        println!("{}: {}", "Setup error".red().bold(), err);
        std::process::exit(1);
    }
}

/// Streams batch progress to stderr on a single rewritten line.
struct CliProgress {
    enabled: bool,
    wrote: bool,
}

impl CliProgress {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            wrote: false,
        }
    }

    fn finish(&self) {
        if self.wrote {
            eprintln!();
        }
    }
}

impl ProgressObserver for CliProgress {
    fn on_progress(&mut self, progress: &Progress) -> ControlFlow<()> {
        if self.enabled {
            eprint!("\r{progress}");
            self.wrote = true;
        }
        ControlFlow::Continue(())
    }
}

fn cmd_resolve(args: ResolveArgs, format: OutputFormat) -> Result<()> {
    let LoadedRules {
        mut registry,
        rule_set,
    } = load_rules_file(&args.rules)?;

    let assets = load_input(inputs::read_inventory(&args.inventory))?;
    let snapshot = load_input(inputs::read_snapshot(args.snapshot.as_deref()))?;
    let dependencies = match &args.dependencies {
        Some(path) => Some(load_input(inputs::read_dependencies(path))?),
        None => None,
    };
    let external = load_input(inputs::parse_external_values(&args.external))?;
    setup_registry(&mut registry, dependencies, external);

    let resolver = Resolver::new(&rule_set, &registry);
    let mut groups = MemoryGroupStore::new();
    let options = ResolveOptions {
        progress_batch: args.progress_batch,
    };
    let mut progress = CliProgress::new(format == OutputFormat::Text);

    let result =
        match resolver.resolve_with_progress(&assets, &snapshot, &mut groups, &options, &mut progress)
        {
            Ok(result) => result,
            Err(err) => {
                progress.finish();
                println!("{}: {}", "Resolution blocked".red().bold(), err);
                std::process::exit(1);
            }
        };
    progress.finish();

    let conflicts = ConflictDetector::scan(&result.resolved);
    let run_report = RunReport::new(&result, conflicts);

    if let Some(path) = &args.report {
        run_report
            .write_file(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    match format {
        OutputFormat::Json => println!("{}", run_report.to_json()?),
        OutputFormat::Text => print_run_summary(&run_report, &groups),
    }
    Ok(())
}

fn print_run_summary(report: &RunReport, groups: &MemoryGroupStore) {
    println!("{}", "Resolution Summary".bold());
    println!("──────────────────");
    if let RunStatus::Aborted { processed } = report.status {
        println!("  Status: {} after {} assets", "aborted".yellow(), processed);
    }
    let stats = &report.stats;
    println!(
        "  Assets processed: {}/{}",
        stats.assets_processed, stats.assets_total
    );
    println!(
        "  Addresses: {} assigned, {} kept",
        stats.addresses_assigned, stats.addresses_kept
    );
    println!("  Labels: {} assigned", stats.labels_assigned);
    println!(
        "  Versions: {} assigned, {} kept",
        stats.versions_assigned, stats.versions_kept
    );
    if stats.excluded > 0 {
        println!(
            "  Excluded (unversioned): {}",
            stats.excluded.to_string().yellow()
        );
    }
    if !groups.created().is_empty() {
        println!("  Groups created: {}", groups.created().join(", ").cyan());
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{} ({})", "Warnings".bold(), report.warnings.len());
        for warning in &report.warnings {
            println!("  {} {}", "warning:".yellow(), warning);
        }
    }

    print_conflicts(&report.conflicts);
}

fn print_conflicts(conflicts: &[Conflict]) {
    if conflicts.is_empty() {
        return;
    }
    println!();
    println!("{} ({})", "Conflicts".bold(), conflicts.len());
    for conflict in conflicts {
        let label = match conflict.severity() {
            ConflictSeverity::Error => "error:".red(),
            ConflictSeverity::Warning => "warning:".yellow(),
        };
        println!("  {} {}", label, conflict.message);
        for path in &conflict.affected_assets {
            println!("      {}", path.dimmed());
        }
        println!("      {} {}", "fix:".cyan(), conflict.suggestion);
    }
}

fn cmd_check(args: CheckArgs, format: OutputFormat) -> Result<()> {
    let LoadedRules {
        mut registry,
        rule_set,
    } = load_rules_file(&args.rules)?;

    let assets = load_input(inputs::read_inventory(&args.inventory))?;
    let snapshot = load_input(inputs::read_snapshot(args.snapshot.as_deref()))?;
    let dependencies = match &args.dependencies {
        Some(path) => Some(load_input(inputs::read_dependencies(path))?),
        None => None,
    };
    let external = load_input(inputs::parse_external_values(&args.external))?;
    setup_registry(&mut registry, dependencies, external);

    let conflicts = match ConflictDetector::preview(&assets, &snapshot, &rule_set, &registry) {
        Ok(conflicts) => conflicts,
        Err(err) => {
            println!("{}: {}", "Check blocked".red().bold(), err);
            std::process::exit(1);
        }
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
    } else if conflicts.is_empty() {
        println!("{}", "No conflicts found.".green());
    } else {
        print_conflicts(&conflicts);
    }

    let errors = conflicts.iter().filter(|c| c.is_error()).count();
    if errors > 0 {
        if format == OutputFormat::Text {
            println!();
            println!(
                "{}",
                format!("{errors} blocking conflict(s) found.").red().bold()
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_preview(args: PreviewArgs, format: OutputFormat) -> Result<()> {
    let LoadedRules {
        mut registry,
        rule_set,
    } = load_rules_file(&args.rules)?;

    let assets = load_input(inputs::read_inventory(&args.inventory))?;
    let snapshot = load_input(inputs::read_snapshot(args.snapshot.as_deref()))?;
    let dependencies = match &args.dependencies {
        Some(path) => Some(load_input(inputs::read_dependencies(path))?),
        None => None,
    };
    let external = load_input(inputs::parse_external_values(&args.external))?;
    setup_registry(&mut registry, dependencies, external);

    let preview = match preview_rule(
        &rule_set,
        &registry,
        args.category,
        &args.rule,
        &assets,
        &snapshot,
        args.limit,
    ) {
        Ok(preview) => preview,
        Err(err) => {
            println!("{}: {}", "Error".red(), err);
            std::process::exit(1);
        }
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!(
        "{} '{}' ({})",
        "Rule".bold(),
        preview.rule,
        preview.category
    );
    println!("  Matches: {}", preview.total_matches);
    if preview.sample.is_empty() {
        return Ok(());
    }
    println!(
        "  Sample (showing {} of {}):",
        preview.sample.len(),
        preview.total_matches
    );
    for sampled in &preview.sample {
        match &sampled.output {
            Some(output) => println!("    {}  {}", sampled.path, output.cyan()),
            None => println!("    {}  {}", sampled.path, "(no output)".yellow()),
        }
    }
    Ok(())
}

fn cmd_validate(rules: &Path) -> Result<()> {
    println!(
        "Validating rules file: {}",
        rules.display().to_string().cyan()
    );

    let loaded = load_rules_file(rules)?;
    let report = loaded.rule_set.validate(&loaded.registry);
    for warning in &report.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }

    println!();
    println!("{}", "Rules Summary".bold());
    println!("─────────────");
    println!("  Filters: {}", loaded.registry.filter_count());
    println!("  Providers: {}", loaded.registry.provider_count());
    println!("  Rules: {}", loaded.rule_set.rule_count());

    println!();
    if report.has_warnings() {
        println!("{}", "Rules file is valid with warnings.".yellow().bold());
    } else {
        println!("{}", "Rules file is valid.".green().bold());
    }
    Ok(())
}

fn cmd_export(rules: &Path, output: Option<PathBuf>) -> Result<()> {
    let loaded = load_rules_file(rules)?;
    let document = match RuleExporter::export(&loaded.rule_set, &loaded.registry) {
        Ok(document) => document,
        Err(err) => {
            println!("{}: {}", "Export error".red().bold(), err);
            std::process::exit(1);
        }
    };
    let json = RuleExporter::to_json(&document)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "{} {} rule(s) exported to {}",
                "OK".green().bold(),
                document.rule_count(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_import(args: ImportArgs) -> Result<()> {
    let LoadedRules {
        registry,
        mut rule_set,
    } = load_rules_file(&args.rules)?;

    let raw = std::fs::read_to_string(&args.document)
        .with_context(|| format!("failed to read document {}", args.document.display()))?;
    let document = match RuleExporter::from_json(&raw) {
        Ok(document) => document,
        Err(err) => {
            println!("{}: {}", "Document error".red().bold(), err);
            std::process::exit(1);
        }
    };

    let outcome = if args.dry_run {
        RuleImporter::validate(&document, &rule_set, &registry, args.mode)
    } else {
        RuleImporter::import(&document, &mut rule_set, &registry, args.mode)
    };
    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            println!("{}: {}", "Import error".red().bold(), err);
            std::process::exit(1);
        }
    };

    if !args.dry_run {
        let target = args.output.as_ref().unwrap_or(&args.rules);
        save_rules(target, &registry, &rule_set)
            .with_context(|| format!("failed to write rules file {}", target.display()))?;
        println!("Rules written to {}", target.display().to_string().cyan());
    }

    print_import_report(&report, args.dry_run);
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_import_report(report: &ImportReport, dry_run: bool) {
    let title = if dry_run {
        "Import Preview"
    } else {
        "Import Summary"
    };
    println!("{}", title.bold());
    println!("──────────────");
    println!(
        "  Imported: {}",
        report.imported.len().to_string().green()
    );
    println!("  Skipped: {}", report.skipped.len().to_string().yellow());
    println!("  Failed: {}", report.failed.len().to_string().red());
    for failure in &report.failed {
        println!("    {} {}", failure.rule.red(), failure.reason);
    }
}
