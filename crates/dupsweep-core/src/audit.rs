//! Append-only audit record for the Action Executor.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of action an [`AuditEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Trash,
    Move,
    PermanentDelete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trash => write!(f, "trash"),
            Self::Move => write!(f, "move"),
            Self::PermanentDelete => write!(f, "permanent_delete"),
        }
    }
}

/// The outcome of a single member's action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Skipped { reason: String },
    Failed { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Append-only record of a single action. Never mutated after being
/// written; `seq` and `ts` are together strictly monotonic within one
/// audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub seq: u64,
    pub action: ActionKind,
    pub src: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<PathBuf>,
    pub outcome: Outcome,
}

impl AuditEntry {
    pub fn new(seq: u64, action: ActionKind, src: PathBuf, dst: Option<PathBuf>, outcome: Outcome) -> Self {
        Self {
            ts: Utc::now(),
            seq,
            action,
            src,
            dst,
            outcome,
        }
    }
}
