//! Duplicate group data model.

use serde::{Deserialize, Serialize};

use crate::descriptor::{FileDescriptor, FullHash};

/// One member of a [`DuplicateGroup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub descriptor: FileDescriptor,
    /// Whether this member is marked for action (trash/move/delete).
    /// A member that is not selected is implicitly "kept".
    pub selected: bool,
}

impl GroupMember {
    pub fn new(descriptor: FileDescriptor) -> Self {
        Self {
            descriptor,
            selected: false,
        }
    }
}

/// A non-empty set of files that share the same full-hash and size.
///
/// Members are ordered deterministically (path lexicographic) for stable
/// UI rendering. Groups with fewer than two members are never constructed
/// by [`DuplicateGroup::new`] — callers should filter single-member
/// candidate buckets before constructing a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub hash: FullHash,
    pub size: u64,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    /// Build a group from descriptors sharing `hash` and `size`.
    ///
    /// Returns `None` if fewer than two descriptors are given — such a
    /// group would be pruned and never surfaced.
    pub fn new(hash: FullHash, size: u64, mut descriptors: Vec<FileDescriptor>) -> Option<Self> {
        if descriptors.len() < 2 {
            return None;
        }
        descriptors.sort_by(|a, b| a.path.cmp(&b.path));
        Some(Self {
            hash,
            size,
            members: descriptors.into_iter().map(GroupMember::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `(|members| - 1) * size`: space reclaimable by keeping one copy.
    pub fn wasted_bytes(&self) -> u64 {
        (self.members.len() as u64 - 1) * self.size
    }

    /// Members currently flagged for action.
    pub fn selected(&self) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().filter(|m| m.selected)
    }

    /// Number of members selected for action.
    pub fn selected_count(&self) -> usize {
        self.members.iter().filter(|m| m.selected).count()
    }

    /// True if applying the current selection would remove every member —
    /// a batch the executor must reject rather than run.
    pub fn would_empty(&self) -> bool {
        self.selected_count() == self.members.len()
    }

    /// Clear all selection flags (used before applying a new strategy).
    pub fn clear_selection(&mut self) {
        for m in &mut self.members {
            m.selected = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor(path: &str, size: u64, mtime: i64) -> FileDescriptor {
        FileDescriptor::new(PathBuf::from(path), size, mtime, 0)
    }

    #[test]
    fn new_rejects_single_member() {
        let group = DuplicateGroup::new(FullHash([0; 32]), 10, vec![descriptor("/a", 10, 0)]);
        assert!(group.is_none());
    }

    #[test]
    fn new_sorts_members_lexicographically() {
        let group = DuplicateGroup::new(
            FullHash([0; 32]),
            10,
            vec![descriptor("/b", 10, 0), descriptor("/a", 10, 0)],
        )
        .unwrap();
        assert_eq!(group.members[0].descriptor.path, PathBuf::from("/a"));
        assert_eq!(group.members[1].descriptor.path, PathBuf::from("/b"));
    }

    #[test]
    fn wasted_bytes_is_size_times_count_minus_one() {
        let group = DuplicateGroup::new(
            FullHash([0; 32]),
            100,
            vec![
                descriptor("/a", 100, 0),
                descriptor("/b", 100, 0),
                descriptor("/c", 100, 0),
            ],
        )
        .unwrap();
        assert_eq!(group.wasted_bytes(), 200);
    }

    #[test]
    fn would_empty_detects_full_selection() {
        let mut group =
            DuplicateGroup::new(FullHash([0; 32]), 10, vec![descriptor("/a", 10, 0), descriptor("/b", 10, 0)])
                .unwrap();
        assert!(!group.would_empty());
        for m in &mut group.members {
            m.selected = true;
        }
        assert!(group.would_empty());
    }
}
