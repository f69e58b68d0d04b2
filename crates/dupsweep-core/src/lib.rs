//! Core types shared by dupsweep's scan, hash, group, and ops crates.
//!
//! This crate holds the shared data model: file descriptors, hash keys
//! and digests, duplicate groups, audit records, the error taxonomy, and
//! the scan/action configuration surfaces. It has no I/O of its own —
//! everything here is a plain value type.

mod audit;
mod descriptor;
mod error;
mod group;
mod options;

pub use audit::{ActionKind, AuditEntry, Outcome};
pub use descriptor::{FileDescriptor, FileHashes, FullHash, HashAlgorithm, HashKey, InodeInfo};
pub use error::{ActionError, Cancelled, CacheError, InputError, IoError, ScanWarning, WarningKind};
pub use group::{DuplicateGroup, GroupMember};
pub use options::{
    ActionOptions, ActionOptionsBuilder, ConflictPolicy, ScanOptions, ScanOptionsBuilder,
};
