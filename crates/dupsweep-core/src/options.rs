//! Scan and action configuration surfaces.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::descriptor::HashAlgorithm;

/// Configuration for a scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanOptions {
    /// Root paths to scan.
    pub roots: Vec<PathBuf>,

    /// Minimum file size; files below are ignored.
    #[builder(default = "1")]
    #[serde(default = "default_min_size")]
    pub min_size: u64,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include glob patterns (empty = include everything).
    #[builder(default)]
    #[serde(default)]
    pub include: Vec<String>,

    /// Exclude glob patterns.
    #[builder(default)]
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Full-hash algorithm.
    #[builder(default)]
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Quick-hash sample size in bytes, taken from head and (if large
    /// enough) tail.
    #[builder(default = "4096")]
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Hasher worker thread count (0 = `max(2, cores-1)`).
    #[builder(default = "0")]
    #[serde(default)]
    pub max_workers: usize,

    /// Whether to consult/populate the persistent hash cache.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

fn default_min_size() -> u64 {
    1
}

fn default_sample_size() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

impl ScanOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.roots {
            Some(roots) if !roots.is_empty() => Ok(()),
            _ => Err("at least one root path is required".to_string()),
        }
    }
}

impl ScanOptions {
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    /// A minimal config scanning a single root with all other defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            min_size: 1,
            follow_symlinks: false,
            include: Vec::new(),
            exclude: Vec::new(),
            hash_algorithm: HashAlgorithm::default(),
            sample_size: 4096,
            max_workers: 0,
            cache_enabled: true,
        }
    }

    /// Resolve `max_workers` against the host's core count.
    pub fn effective_worker_count(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(2))
                .unwrap_or(2)
        }
    }
}

/// How a destination collision during move/copy is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Append a numeric suffix to the new file until no collision remains.
    #[default]
    RenameWithSuffix,
    /// Overwrite the destination if it full-hashes identically; otherwise
    /// skip.
    OverwriteIfSameHash,
    /// Skip the file outright.
    Skip,
}

/// Configuration for an action batch.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct ActionOptions {
    /// Destination collision policy for move.
    #[builder(default)]
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Must be explicitly true to permanently delete; a missing/false flag
    /// downgrades the request to send-to-trash — never the reverse.
    #[builder(default = "false")]
    #[serde(default)]
    pub permanent: bool,
}

impl ActionOptions {
    pub fn builder() -> ActionOptionsBuilder {
        ActionOptionsBuilder::default()
    }
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            permanent: false,
        }
    }
}
