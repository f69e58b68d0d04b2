//! Parallel directory traversal and size-bucket grouping.
//!
//! This crate owns Pass 1 of the pipeline: walk the given
//! roots, apply include/exclude filters and the minimum-size floor, fold
//! hardlinks to a single candidate, and bucket the survivors by size.
//! Buckets with a single member can never contain a duplicate and are
//! dropped before Pass 2 (quick-hash, in `dupsweep-hash`).

mod cancel;
mod inode;
mod progress;
mod scanner;

pub use cancel::CancellationToken;
pub use inode::InodeTracker;
pub use progress::{NullProgressSink, Pass, ProgressSink, ScanProgress};
pub use scanner::{ScanResult, Scanner};

use dupsweep_core::FileDescriptor;

/// Drop size buckets with fewer than two members; they cannot contain a
/// duplicate pair.
pub fn candidate_groups(
    size_groups: std::collections::HashMap<u64, Vec<FileDescriptor>>,
) -> std::collections::HashMap<u64, Vec<FileDescriptor>> {
    size_groups.into_iter().filter(|(_, v)| v.len() > 1).collect()
}
