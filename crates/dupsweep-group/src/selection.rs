//! Selection strategies: which member of a duplicate group to keep.
//!
//! Every strategy is a pure function over a [`DuplicateGroup`]: it marks
//! exactly one member "kept" (unselected) and every other member
//! "selected for action". Applying the same strategy twice produces the
//! same selection.

use dupsweep_core::DuplicateGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Keep the member with the smallest mtime; ties broken by shortest
    /// path, then lexicographic.
    KeepOldest,
    /// Keep the member with the largest mtime; ties broken by shortest
    /// path, then lexicographic.
    KeepNewest,
    /// Keep the member with the fewest path separators, then the
    /// shortest byte length; ties broken lexicographically.
    KeepShortestPath,
    /// Keep the lexicographically smallest path.
    KeepFirstAlphabetical,
    /// Preselect nothing; the caller flags members individually.
    Manual,
}

impl SelectionStrategy {
    /// Apply this strategy to `group`, replacing any prior selection.
    pub fn apply(self, group: &mut DuplicateGroup) {
        match self {
            Self::Manual => group.clear_selection(),
            _ => {
                let keep_index = self.keep_index(group);
                for (i, member) in group.members.iter_mut().enumerate() {
                    member.selected = i != keep_index;
                }
            }
        }
    }

    fn keep_index(self, group: &DuplicateGroup) -> usize {
        let members = &group.members;
        match self {
            Self::KeepOldest => members
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.descriptor
                        .mtime_secs
                        .cmp(&b.descriptor.mtime_secs)
                        .then(a.descriptor.mtime_nanos.cmp(&b.descriptor.mtime_nanos))
                        .then(path_len(a).cmp(&path_len(b)))
                        .then(a.descriptor.path.cmp(&b.descriptor.path))
                })
                .map(|(i, _)| i)
                .unwrap_or(0),
            Self::KeepNewest => members
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.descriptor
                        .mtime_secs
                        .cmp(&b.descriptor.mtime_secs)
                        .then(a.descriptor.mtime_nanos.cmp(&b.descriptor.mtime_nanos))
                        .then(path_len(b).cmp(&path_len(a)))
                        .then(b.descriptor.path.cmp(&a.descriptor.path))
                })
                .map(|(i, _)| i)
                .unwrap_or(0),
            Self::KeepShortestPath => members
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    separator_count(a).cmp(&separator_count(b))
                        .then(path_len(a).cmp(&path_len(b)))
                        .then(a.descriptor.path.cmp(&b.descriptor.path))
                })
                .map(|(i, _)| i)
                .unwrap_or(0),
            Self::KeepFirstAlphabetical => members
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.descriptor.path.cmp(&b.descriptor.path))
                .map(|(i, _)| i)
                .unwrap_or(0),
            Self::Manual => unreachable!("handled in apply"),
        }
    }
}

fn path_len(member: &dupsweep_core::GroupMember) -> usize {
    member.descriptor.path.as_os_str().len()
}

fn separator_count(member: &dupsweep_core::GroupMember) -> usize {
    member.descriptor.path.components().count()
}
