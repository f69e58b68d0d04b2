//! dupsweep - duplicate file detection core with a CLI conformance shell.
//!
//! Usage:
//!   dupsweep scan <ROOTS...> [options]      Run the detection pipeline, print JSON
//!   dupsweep execute --action <...> ...     Run an action batch non-interactively
//!
//! This binary is not a shell for end users (no TUI/GUI): it exists so the
//! core crates' external interface is exercised the same way a real
//! frontend would call it. Exit codes: 0 success, 1 user error (bad
//! arguments, missing root), 2 runtime error (unreadable cache), 130
//! cancelled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use dupsweep_core::{
    ActionKind, ActionOptionsBuilder, ConflictPolicy, DuplicateGroup, FileDescriptor,
    HashAlgorithm, InputError, ScanOptionsBuilder,
};
use dupsweep_group::{GroupManager, GroupStats, SelectionStrategy};
use dupsweep_hash::{HashCache, HashPool};
use dupsweep_ops::{ActionExecutor, AuditLog};
use dupsweep_scan::{CancellationToken, NullProgressSink, Pass, ProgressSink, Scanner};

#[derive(Parser)]
#[command(
    name = "dupsweep",
    version,
    about = "Byte-identical duplicate file detection core",
    long_about = "dupsweep walks one or more directory trees, groups files that are \
                  byte-identical, and lets a chosen strategy select which copies to \
                  act on. `scan` reports groups as JSON; `execute` runs a batch \
                  non-interactively."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the given roots and report duplicate groups as JSON.
    Scan {
        /// Root directories to scan.
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// TOML file supplying defaults for any flag not given below.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Minimum file size to consider, in bytes.
        #[arg(long)]
        min_size: Option<u64>,

        /// Follow symbolic links while walking.
        #[arg(long)]
        follow_symlinks: bool,

        /// Include only files matching one of these glob patterns.
        #[arg(long)]
        include: Vec<String>,

        /// Exclude files matching any of these glob patterns.
        #[arg(long)]
        exclude: Vec<String>,

        /// Full-hash algorithm.
        #[arg(long, value_enum)]
        hash_algorithm: Option<HashAlgorithmArg>,

        /// Bytes sampled from head/tail for the quick-hash pass.
        #[arg(long)]
        sample_size: Option<usize>,

        /// Hasher worker threads (0 = max(2, cores-1)).
        #[arg(long)]
        max_workers: Option<usize>,

        /// Disable the persistent hash cache.
        #[arg(long)]
        no_cache: bool,

        /// Selection strategy applied to each group before printing.
        #[arg(long, value_enum)]
        strategy: Option<SelectionStrategyArg>,
    },

    /// Run an action batch (trash/move/delete) over a scan's groups.
    Execute {
        /// Root directories to scan before acting.
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// TOML file supplying defaults for any flag not given below.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Action to apply to every selected (non-kept) member.
        #[arg(long, value_enum)]
        action: ActionKindArg,

        /// Selection strategy deciding which members are acted on.
        #[arg(long, value_enum)]
        strategy: Option<SelectionStrategyArg>,

        /// Destination directory, required when `--action move`.
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Destination collision policy for move.
        #[arg(long, value_enum)]
        conflict_policy: Option<ConflictPolicyArg>,

        /// Required to actually permanently delete; otherwise downgraded to trash.
        #[arg(long)]
        permanent: bool,

        /// Minimum file size to consider, in bytes.
        #[arg(long)]
        min_size: Option<u64>,

        /// Full-hash algorithm.
        #[arg(long, value_enum)]
        hash_algorithm: Option<HashAlgorithmArg>,
    },
}

/// On-disk defaults loaded via `--config`, the same "load, fall back to
/// `Default`" idiom used elsewhere in this codebase for settings files.
/// Every field is optional: a config file only needs to set what it wants
/// to override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct FileConfig {
    min_size: Option<u64>,
    follow_symlinks: Option<bool>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    hash_algorithm: Option<HashAlgorithmArg>,
    sample_size: Option<usize>,
    max_workers: Option<usize>,
    cache_enabled: Option<bool>,
    strategy: Option<SelectionStrategyArg>,
    conflict_policy: Option<ConflictPolicyArg>,
    permanent: Option<bool>,
}

impl FileConfig {
    fn load(path: Option<&std::path::Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HashAlgorithmArg {
    Sha256,
    Blake3,
}

impl From<HashAlgorithmArg> for HashAlgorithm {
    fn from(value: HashAlgorithmArg) -> Self {
        match value {
            HashAlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            HashAlgorithmArg::Blake3 => HashAlgorithm::Blake3,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SelectionStrategyArg {
    KeepOldest,
    KeepNewest,
    KeepShortestPath,
    KeepFirstAlphabetical,
    Manual,
}

impl From<SelectionStrategyArg> for SelectionStrategy {
    fn from(value: SelectionStrategyArg) -> Self {
        match value {
            SelectionStrategyArg::KeepOldest => SelectionStrategy::KeepOldest,
            SelectionStrategyArg::KeepNewest => SelectionStrategy::KeepNewest,
            SelectionStrategyArg::KeepShortestPath => SelectionStrategy::KeepShortestPath,
            SelectionStrategyArg::KeepFirstAlphabetical => SelectionStrategy::KeepFirstAlphabetical,
            SelectionStrategyArg::Manual => SelectionStrategy::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActionKindArg {
    Trash,
    Move,
    Delete,
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConflictPolicyArg {
    RenameWithSuffix,
    OverwriteIfSameHash,
    Skip,
}

impl From<ConflictPolicyArg> for ConflictPolicy {
    fn from(value: ConflictPolicyArg) -> Self {
        match value {
            ConflictPolicyArg::RenameWithSuffix => ConflictPolicy::RenameWithSuffix,
            ConflictPolicyArg::OverwriteIfSameHash => ConflictPolicy::OverwriteIfSameHash,
            ConflictPolicyArg::Skip => ConflictPolicy::Skip,
        }
    }
}

/// JSON shape printed by `dupsweep scan`.
#[derive(Serialize)]
struct ScanReport {
    groups: Vec<GroupReport>,
    group_count: usize,
    files_with_duplicates: u64,
    total_wasted_bytes: u64,
    files_scanned: u64,
    dirs_scanned: u64,
    warnings: usize,
    elapsed_secs: f64,
}

#[derive(Serialize)]
struct GroupReport {
    hash: String,
    size: u64,
    wasted_bytes: u64,
    members: Vec<MemberReport>,
}

#[derive(Serialize)]
struct MemberReport {
    path: PathBuf,
    selected: bool,
}

fn main() -> ExitCode {
    color_eyre::install().expect("failed to install error handler");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || cancel_for_signal.cancel()) {
        tracing::warn!(%err, "failed to install Ctrl-C handler; cancellation will only work cooperatively");
    }

    let cli = Cli::parse();
    match run(cli, &cancel) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli, cancel: &CancellationToken) -> Result<ExitCode> {
    match cli.command {
        Command::Scan {
            roots,
            config,
            min_size,
            follow_symlinks,
            include,
            exclude,
            hash_algorithm,
            sample_size,
            max_workers,
            no_cache,
            strategy,
        } => {
            let file_config = FileConfig::load(config.as_deref());
            let hash_algorithm = hash_algorithm.or(file_config.hash_algorithm).unwrap_or(HashAlgorithmArg::Sha256);
            let strategy = strategy.or(file_config.strategy).unwrap_or(SelectionStrategyArg::KeepOldest);
            let include = if include.is_empty() { file_config.include.unwrap_or_default() } else { include };
            let exclude = if exclude.is_empty() { file_config.exclude.unwrap_or_default() } else { exclude };

            let options = ScanOptionsBuilder::default()
                .roots(roots)
                .min_size(min_size.or(file_config.min_size).unwrap_or(1))
                .follow_symlinks(follow_symlinks || file_config.follow_symlinks.unwrap_or(false))
                .include(include)
                .exclude(exclude)
                .hash_algorithm(HashAlgorithm::from(hash_algorithm))
                .sample_size(sample_size.or(file_config.sample_size).unwrap_or(4096))
                .max_workers(max_workers.or(file_config.max_workers).unwrap_or(0))
                .cache_enabled(!no_cache && file_config.cache_enabled.unwrap_or(true))
                .build()
                .map_err(|e| InputError::InvalidConfig { message: e.to_string() })
                .context("invalid scan options")?;

            match run_pipeline(&options, strategy.into(), cancel) {
                Ok((groups, stats, scan_meta)) => {
                    print_scan_report(&groups, &stats, &scan_meta);
                    if cancel.is_cancelled() {
                        Ok(ExitCode::from(130))
                    } else {
                        Ok(ExitCode::SUCCESS)
                    }
                }
                Err(PipelineError::Input(err)) => {
                    eprintln!("error: {err}");
                    Ok(ExitCode::from(1))
                }
                Err(PipelineError::Cache(err)) => {
                    eprintln!("error: {err}");
                    Ok(ExitCode::from(2))
                }
            }
        }

        Command::Execute {
            roots,
            config,
            action,
            strategy,
            destination,
            conflict_policy,
            permanent,
            min_size,
            hash_algorithm,
        } => {
            let file_config = FileConfig::load(config.as_deref());
            let hash_algorithm = hash_algorithm.or(file_config.hash_algorithm).unwrap_or(HashAlgorithmArg::Sha256);
            let strategy = strategy.or(file_config.strategy).unwrap_or(SelectionStrategyArg::KeepOldest);
            let conflict_policy = conflict_policy
                .or(file_config.conflict_policy)
                .unwrap_or(ConflictPolicyArg::RenameWithSuffix);
            let permanent = permanent || file_config.permanent.unwrap_or(false);

            let options = ScanOptionsBuilder::default()
                .roots(roots)
                .min_size(min_size.or(file_config.min_size).unwrap_or(1))
                .hash_algorithm(HashAlgorithm::from(hash_algorithm))
                .build()
                .map_err(|e| InputError::InvalidConfig { message: e.to_string() })
                .context("invalid scan options")?;

            let (groups, _stats, _meta) = match run_pipeline(&options, strategy.into(), cancel) {
                Ok(result) => result,
                Err(PipelineError::Input(err)) => {
                    eprintln!("error: {err}");
                    return Ok(ExitCode::from(1));
                }
                Err(PipelineError::Cache(err)) => {
                    eprintln!("error: {err}");
                    return Ok(ExitCode::from(2));
                }
            };

            if cancel.is_cancelled() {
                return Ok(ExitCode::from(130));
            }

            let action_options = ActionOptionsBuilder::default()
                .conflict_policy(ConflictPolicy::from(conflict_policy))
                .permanent(permanent)
                .build()
                .expect("action options always build");

            let audit_dir = data_dir().join("audit");
            let audit = AuditLog::open(audit_dir).context("failed to open audit log")?;
            let executor = ActionExecutor::new(audit);

            let action_kind = match action {
                ActionKindArg::Trash => ActionKind::Trash,
                ActionKindArg::Move => ActionKind::Move,
                ActionKindArg::Delete => ActionKind::PermanentDelete,
            };

            match executor.execute(&groups, action_kind, &action_options, destination.as_deref()) {
                Ok(outcome) => {
                    println!(
                        "{} succeeded, {} skipped, {} failed",
                        outcome.succeeded(),
                        outcome.skipped().len(),
                        outcome.failed().len()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    Ok(ExitCode::from(1))
                }
            }
        }
    }
}

struct ScanMeta {
    files_scanned: u64,
    dirs_scanned: u64,
    warnings: usize,
    elapsed_secs: f64,
}

enum PipelineError {
    Input(InputError),
    Cache(dupsweep_core::CacheError),
}

impl From<InputError> for PipelineError {
    fn from(err: InputError) -> Self {
        Self::Input(err)
    }
}

impl From<dupsweep_core::CacheError> for PipelineError {
    fn from(err: dupsweep_core::CacheError) -> Self {
        Self::Cache(err)
    }
}

/// Runs the full three-pass pipeline: size bucketing, quick-hash
/// re-bucketing, full-hash re-bucketing, grouping, then selection.
fn run_pipeline(
    options: &dupsweep_core::ScanOptions,
    strategy: SelectionStrategy,
    cancel: &CancellationToken,
) -> Result<(Vec<DuplicateGroup>, GroupStats, ScanMeta), PipelineError> {
    let worker_count = options.effective_worker_count();

    let mut scanner = Scanner::new(options.min_size, options.follow_symlinks, worker_count);
    if !options.include.is_empty() {
        scanner = scanner.with_include(&options.include)?;
    }
    if !options.exclude.is_empty() {
        scanner = scanner.with_exclude(&options.exclude)?;
    }

    let sink = NullProgressSink;
    let scan_result = scanner.scan(&options.roots, cancel, &sink)?;
    sink.on_pass_complete(
        Pass::Enumerate,
        scan_result.files_scanned,
        scan_result.files_scanned,
        0,
    );
    let candidates = dupsweep_scan::candidate_groups(scan_result.size_groups);

    let cache = if options.cache_enabled {
        let cache = HashCache::open(data_dir().join("cache.db"))?;
        match cache.recorded_algorithm()? {
            Some(recorded) if recorded.name() != options.hash_algorithm.name() => {
                let cleared = cache.clear_full_hashes()?;
                tracing::warn!(
                    recorded = recorded.name(),
                    requested = options.hash_algorithm.name(),
                    cleared,
                    "hash algorithm changed; full-hash cache entries invalidated and will be recomputed"
                );
            }
            _ => {}
        }
        cache.record_algorithm(options.hash_algorithm)?;
        Some(cache)
    } else {
        None
    };

    let pool = HashPool::new(worker_count);

    // Pass 2: quick-hash, re-bucket by (size, quick_hash).
    let total_candidates: u64 = candidates.values().map(|v| v.len() as u64).sum();
    let mut quick_files_processed = 0u64;
    let mut quick_bytes_read = 0u64;
    let mut quick_groups: HashMap<(u64, u64), Vec<FileDescriptor>> = HashMap::new();
    for (size, descriptors) in candidates {
        if cancel.is_cancelled() {
            break;
        }

        let mut to_hash = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if let Some(cache) = &cache {
                if let Ok(Some((Some(quick), _))) = cache.get(&descriptor.hash_key()) {
                    quick_files_processed += 1;
                    quick_bytes_read += size;
                    quick_groups.entry((size, quick)).or_default().push(descriptor);
                    continue;
                }
            }
            to_hash.push(descriptor);
        }

        for (descriptor, result) in pool.quick_hash_all(&to_hash, options.sample_size) {
            if let Ok(quick) = result {
                if let Some(cache) = &cache {
                    let _ = cache.put(&descriptor.hash_key(), Some(quick), None);
                }
                quick_files_processed += 1;
                quick_bytes_read += size;
                quick_groups.entry((size, quick)).or_default().push(descriptor);
            }
        }
    }
    quick_groups.retain(|_, v| v.len() > 1);
    sink.on_pass_complete(
        Pass::QuickHash,
        quick_files_processed,
        total_candidates,
        quick_bytes_read,
    );

    // Pass 3: full-hash, re-bucket by (size, full_hash).
    let full_total_candidates: u64 = quick_groups.values().map(|v| v.len() as u64).sum();
    let mut full_files_processed = 0u64;
    let mut full_bytes_read = 0u64;
    let mut manager = GroupManager::new();
    for ((size, _quick), descriptors) in quick_groups {
        if cancel.is_cancelled() {
            break;
        }

        let mut to_hash = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if let Some(cache) = &cache {
                if let Ok(Some((_, Some(full)))) = cache.get(&descriptor.hash_key()) {
                    full_files_processed += 1;
                    full_bytes_read += size;
                    manager.record(descriptor, size, full);
                    continue;
                }
            }
            to_hash.push(descriptor);
        }

        for (descriptor, result) in pool.full_hash_all(&to_hash, options.hash_algorithm) {
            if let Ok(full) = result {
                if let Some(cache) = &cache {
                    let quick = cache
                        .get(&descriptor.hash_key())
                        .ok()
                        .flatten()
                        .and_then(|(q, _)| q);
                    let _ = cache.put(&descriptor.hash_key(), quick, Some(full));
                }
                full_files_processed += 1;
                full_bytes_read += size;
                manager.record(descriptor, size, full);
            }
        }
    }
    sink.on_pass_complete(
        Pass::FullHash,
        full_files_processed,
        full_total_candidates,
        full_bytes_read,
    );

    if let Some(cache) = &cache {
        let _ = cache.prune();
    }

    let (mut groups, stats) = manager.finish();
    for group in &mut groups {
        strategy.apply(group);
    }

    Ok((
        groups,
        stats,
        ScanMeta {
            files_scanned: scan_result.files_scanned,
            dirs_scanned: scan_result.dirs_scanned,
            warnings: scan_result.warnings.len(),
            elapsed_secs: scan_result.elapsed.as_secs_f64(),
        },
    ))
}

fn print_scan_report(groups: &[DuplicateGroup], stats: &GroupStats, meta: &ScanMeta) {
    eprintln!(
        "{} files scanned, {} groups, {} wasted",
        meta.files_scanned,
        stats.group_count,
        humansize::format_size(stats.total_wasted_bytes, humansize::BINARY)
    );

    let report = ScanReport {
        groups: groups.iter().map(group_report).collect(),
        group_count: stats.group_count,
        files_with_duplicates: stats.files_with_duplicates,
        total_wasted_bytes: stats.total_wasted_bytes,
        files_scanned: meta.files_scanned,
        dirs_scanned: meta.dirs_scanned,
        warnings: meta.warnings,
        elapsed_secs: meta.elapsed_secs,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize report: {err}"),
    }
}

fn group_report(group: &DuplicateGroup) -> GroupReport {
    GroupReport {
        hash: group.hash.to_hex(),
        size: group.size,
        wasted_bytes: group.wasted_bytes(),
        members: group
            .members
            .iter()
            .map(|m| MemberReport {
                path: m.descriptor.path.clone(),
                selected: m.selected,
            })
            .collect(),
    }
}

/// Per-user data directory backing the persistent hash cache and audit log.
fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "dupsweep")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".dupsweep"))
}

