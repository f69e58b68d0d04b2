//! Error taxonomy shared across the scan, hash, group, and ops crates.
//!
//! `InputError` and unrecoverable `CacheError` are the only kinds that
//! surface as fatal results to a caller. Everything else is recovered —
//! skipped with a reason attached to a warning/failure list — and the
//! pipeline continues.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed arguments or a missing root — fatal, surfaces to the caller.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("root path does not exist: {path}")]
    MissingRoot { path: PathBuf },

    #[error("root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Per-file I/O error. Always recovered: attach to a warning list, skip the
/// file, continue the pipeline.
#[derive(Debug, Error, Clone)]
pub enum IoError {
    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("file vanished during processing: {path}")]
    Vanished { path: PathBuf },

    #[error("I/O error at {path}: {message}")]
    Other { path: PathBuf, message: String },
}

impl IoError {
    /// Classify a raw `std::io::Error` with path context.
    pub fn from_io(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::Vanished { path },
            _ => Self::Other {
                path,
                message: source.to_string(),
            },
        }
    }
}

/// Hash cache storage failure. The cache attempts a single rebuild on
/// failure; only a twice-failed rebuild becomes fatal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(String),

    #[error("cache storage error: {0}")]
    Storage(String),

    #[error("cache schema version mismatch (found {found}, expected {expected})")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("cache rebuild failed after a prior rebuild attempt: {0}")]
    RebuildFailed(String),
}

/// Failure executing a batch action (trash/move/delete).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("selection would remove every member of a duplicate group")]
    WouldEmptyGroup,

    #[error("file changed since grouping: {path}")]
    Changed { path: PathBuf },

    #[error("trash is unavailable on this platform: {reason}")]
    TrashUnavailable { reason: String },

    #[error("destination collision could not be resolved: {path}")]
    UnresolvedConflict { path: PathBuf },

    #[error("I/O error acting on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("checksum mismatch after copy, refusing to remove source: {path}")]
    VerificationFailed { path: PathBuf },
}

/// Orderly cancellation, not a failure.
#[derive(Debug, Error, Clone, Copy)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Kind of non-fatal warning recorded during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    PermissionDenied,
    BrokenSymlink,
    ReadError,
    MetadataError,
    CrossFilesystem,
    Cancelled,
    CacheDegraded,
}

/// A non-fatal warning encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
    pub kind: WarningKind,
}

impl ScanWarning {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn from_io(path: impl Into<PathBuf>, err: &IoError) -> Self {
        let path = path.into();
        let kind = match err {
            IoError::PermissionDenied { .. } => WarningKind::PermissionDenied,
            IoError::Vanished { .. } => WarningKind::ReadError,
            IoError::Other { .. } => WarningKind::MetadataError,
        };
        Self {
            message: err.to_string(),
            path,
            kind,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            path: PathBuf::new(),
            message: "scan cancelled before completion".to_string(),
            kind: WarningKind::Cancelled,
        }
    }
}
