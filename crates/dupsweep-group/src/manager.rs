//! Aggregates hashed descriptors into duplicate groups.

use std::collections::HashMap;

use dupsweep_core::{DuplicateGroup, FileDescriptor, FullHash};

/// Statistics summarizing one grouping pass, independent of any
/// selection strategy.
#[derive(Debug, Clone, Default)]
pub struct GroupStats {
    pub files_with_duplicates: u64,
    pub group_count: usize,
    pub total_wasted_bytes: u64,
}

/// Builds [`DuplicateGroup`]s from `(descriptor, size, full_hash)`
/// triples produced by the hashing pipeline.
#[derive(Default)]
pub struct GroupManager {
    buckets: HashMap<(u64, FullHash), Vec<FileDescriptor>>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fully hashed file.
    pub fn record(&mut self, descriptor: FileDescriptor, size: u64, hash: FullHash) {
        self.buckets.entry((size, hash)).or_default().push(descriptor);
    }

    /// Finalize into duplicate groups, sorted by wasted bytes descending
    /// (ties broken by the group's first member's path, for a stable
    /// order across runs).
    pub fn finish(self) -> (Vec<DuplicateGroup>, GroupStats) {
        let mut groups: Vec<DuplicateGroup> = self
            .buckets
            .into_iter()
            .filter_map(|((size, hash), descriptors)| DuplicateGroup::new(hash, size, descriptors))
            .collect();

        groups.sort_by(|a, b| {
            b.wasted_bytes()
                .cmp(&a.wasted_bytes())
                .then_with(|| a.members[0].descriptor.path.cmp(&b.members[0].descriptor.path))
        });

        let stats = GroupStats {
            files_with_duplicates: groups.iter().map(|g| g.len() as u64).sum(),
            group_count: groups.len(),
            total_wasted_bytes: groups.iter().map(|g| g.wasted_bytes()).sum(),
        };

        (groups, stats)
    }
}
