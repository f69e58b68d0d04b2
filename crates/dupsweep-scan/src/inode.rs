//! Inode tracking for hardlink deduplication.

use dashmap::DashSet;
use dupsweep_core::InodeInfo;

/// Tracks seen (inode, device) pairs so a file reached by two hardlinked
/// paths is only queued for hashing once.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: DashSet<InodeInfo>,
}

impl InodeTracker {
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track an inode. Returns `true` the first time it's seen; `false`
    /// for every subsequent hardlink to the same physical file.
    pub fn track(&self, info: InodeInfo) -> bool {
        self.seen.insert(info)
    }

    pub fn has_seen(&self, info: &InodeInfo) -> bool {
        self.seen.contains(info)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
