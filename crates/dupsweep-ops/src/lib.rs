//! Transactional action executor and append-only audit log.
//!
//! Runs trash/move/permanent-delete over the members a [`SelectionStrategy`]
//! (from `dupsweep-group`) has flagged, one file at a time, enforcing the
//! safety rules: never empty a group, re-stat before
//! acting, resolve destination collisions per policy, never silently
//! escalate trash to permanent delete.

mod audit;
mod conflict;
mod executor;

pub use audit::AuditLog;
pub use conflict::{auto_rename_path, resolve as resolve_conflict};
pub use executor::{ActionExecutor, BatchOutcome, MemberOutcome};
