//! Transactional action executor: trash / move / permanent-delete over a
//! batch of selected duplicate-group members.

use std::fs;
use std::path::{Path, PathBuf};

use dupsweep_core::{
    ActionError, ActionKind, ActionOptions, DuplicateGroup, GroupMember, Outcome,
};

use crate::audit::AuditLog;
use crate::conflict;

/// Outcome recorded for a single member after a batch runs.
#[derive(Debug, Clone)]
pub struct MemberOutcome {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Result of one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<MemberOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> Vec<&MemberOutcome> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
            .collect()
    }

    pub fn skipped(&self) -> Vec<&MemberOutcome> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped { .. }))
            .collect()
    }
}

/// Executes trash/move/delete actions over selected group members, one
/// file at a time, fsyncing an audit entry after each.
pub struct ActionExecutor {
    audit: AuditLog,
}

impl ActionExecutor {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }

    /// Run a batch. `action` is the action requested by the caller;
    /// `destination` is required for `ActionKind::Move`. Returns
    /// `Err(ActionError::WouldEmptyGroup)` without touching the
    /// filesystem or the audit log if any group's selection would empty
    /// it.
    pub fn execute(
        &self,
        groups: &[DuplicateGroup],
        action: ActionKind,
        options: &ActionOptions,
        destination: Option<&Path>,
    ) -> Result<BatchOutcome, ActionError> {
        if groups.iter().any(DuplicateGroup::would_empty) {
            return Err(ActionError::WouldEmptyGroup);
        }

        // Rule 4: permanent delete requires the explicit flag; a
        // missing/false flag downgrades the whole batch to trash. It is
        // never escalated the other way.
        let effective_action = match action {
            ActionKind::PermanentDelete if !options.permanent => ActionKind::Trash,
            other => other,
        };

        if effective_action == ActionKind::Move && destination.is_none() {
            return Err(ActionError::Io {
                path: PathBuf::new(),
                message: "move action requires a destination directory".to_string(),
            });
        }

        let mut results = Vec::new();
        for group in groups {
            for member in group.selected() {
                let outcome = self.execute_member(member, group.size, effective_action, options, destination);
                if let Outcome::Failed { ref reason } = outcome {
                    tracing::warn!(path = ?member.descriptor.path, reason, "action failed");
                }
                let _ = self.audit.record(
                    effective_action,
                    member.descriptor.path.clone(),
                    destination.map(|d| d.join(member.descriptor.path.file_name().unwrap_or_default())),
                    outcome.clone(),
                );
                results.push(MemberOutcome {
                    path: member.descriptor.path.clone(),
                    outcome,
                });
            }
        }

        tracing::info!(
            action = ?effective_action,
            groups = groups.len(),
            succeeded = results.iter().filter(|r| r.outcome.is_success()).count(),
            "batch complete"
        );
        Ok(BatchOutcome { results })
    }

    fn execute_member(
        &self,
        member: &GroupMember,
        expected_size: u64,
        action: ActionKind,
        options: &ActionOptions,
        destination: Option<&Path>,
    ) -> Outcome {
        let path = &member.descriptor.path;

        // Rule 2: re-stat before acting.
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(_) => {
                return Outcome::Skipped {
                    reason: "changed".to_string(),
                };
            }
        };
        if metadata.len() != expected_size || !mtime_matches(&metadata, &member.descriptor) {
            return Outcome::Skipped {
                reason: "changed".to_string(),
            };
        }

        match action {
            ActionKind::Trash => self.do_trash(path),
            ActionKind::PermanentDelete => self.do_permanent_delete(path),
            ActionKind::Move => {
                let destination = destination.expect("validated by caller");
                self.do_move(path, destination, options)
            }
        }
    }

    fn do_trash(&self, path: &Path) -> Outcome {
        match trash::delete(path) {
            Ok(()) => Outcome::Success,
            Err(err) => Outcome::Failed {
                reason: format!("trash unavailable: {err}"),
            },
        }
    }

    fn do_permanent_delete(&self, path: &Path) -> Outcome {
        match fs::remove_file(path) {
            Ok(()) => Outcome::Success,
            Err(err) => Outcome::Failed {
                reason: err.to_string(),
            },
        }
    }

    fn do_move(&self, path: &Path, destination_dir: &Path, options: &ActionOptions) -> Outcome {
        if let Err(err) = fs::create_dir_all(destination_dir) {
            return Outcome::Failed {
                reason: format!("failed to create destination: {err}"),
            };
        }

        let file_name = path.file_name().unwrap_or_default();
        let dest_path = destination_dir.join(file_name);

        let resolved = conflict::resolve(&dest_path, options.conflict_policy, || {
            files_are_identical(path, &dest_path)
        });
        let Some(resolved) = resolved else {
            return Outcome::Skipped {
                reason: "destination collision".to_string(),
            };
        };

        if fs::rename(path, &resolved).is_ok() {
            return Outcome::Success;
        }

        // Cross-volume fallback: copy, verify, then remove the source.
        match fs::copy(path, &resolved) {
            Ok(_) => {
                if !files_are_identical(path, &resolved) {
                    let _ = fs::remove_file(&resolved);
                    return Outcome::Failed {
                        reason: "checksum mismatch after copy".to_string(),
                    };
                }
                match fs::remove_file(path) {
                    Ok(()) => Outcome::Success,
                    Err(err) => Outcome::Failed {
                        reason: format!("copied but failed to remove source: {err}"),
                    },
                }
            }
            Err(err) => Outcome::Failed {
                reason: format!("failed to copy: {err}"),
            },
        }
    }
}

fn mtime_matches(metadata: &std::fs::Metadata, descriptor: &dupsweep_core::FileDescriptor) -> bool {
    let current = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok());
    match current {
        Some(d) => {
            d.as_secs() as i64 == descriptor.mtime_secs && d.subsec_nanos() == descriptor.mtime_nanos
        }
        None => true,
    }
}

fn files_are_identical(a: &Path, b: &Path) -> bool {
    match (fs::read(a), fs::read(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
