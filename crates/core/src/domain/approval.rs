use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::{Identity, Profile};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub identity: Identity,
    pub profile: Profile,
    pub requested_at: DateTime<Utc>,
}

/// Result of an administrator decision.
///
/// `profile` is the snapshot held by the pending request at decision time, or an
/// empty profile when no request was pending. `applied` is false when the
/// decision changed nothing (a repeated press on an already decided request).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub identity: Identity,
    pub verdict: Verdict,
    pub profile: Profile,
    pub had_pending: bool,
    pub applied: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSnapshot {
    pub pending: usize,
    pub approved: usize,
}
