//! Process-wide approval state.
//!
//! Pending access requests and the approved set live behind a single lock so
//! that a decision and a concurrent re-entry for the same identity can never
//! interleave. Nothing here survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::domain::approval::{ApprovalSnapshot, DecisionOutcome, PendingRequest, Verdict};
use crate::domain::identity::{Identity, Profile};

pub trait ApprovalStore: Send + Sync {
    /// Records (or overwrites) the pending request for `identity`.
    fn request_access(&self, identity: Identity, profile: Profile);

    /// Consumes the pending request for `identity` and applies `verdict`.
    ///
    /// An absent request is not an error: the outcome then carries an empty
    /// profile and `had_pending = false`.
    fn decide(&self, identity: Identity, verdict: Verdict) -> DecisionOutcome;

    fn is_approved(&self, identity: Identity) -> bool;

    fn is_pending(&self, identity: Identity) -> bool;

    fn snapshot(&self) -> ApprovalSnapshot;
}

#[derive(Default)]
struct ApprovalState {
    pending: HashMap<Identity, PendingRequest>,
    approved: HashSet<Identity>,
}

#[derive(Default)]
pub struct InMemoryApprovalStore {
    state: Mutex<ApprovalState>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_request(&self, identity: Identity) -> Option<PendingRequest> {
        self.lock().pending.get(&identity).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, ApprovalState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ApprovalStore for InMemoryApprovalStore {
    fn request_access(&self, identity: Identity, profile: Profile) {
        let request = PendingRequest { identity, profile, requested_at: Utc::now() };
        self.lock().pending.insert(identity, request);
    }

    fn decide(&self, identity: Identity, verdict: Verdict) -> DecisionOutcome {
        let mut state = self.lock();
        let pending = state.pending.remove(&identity);
        let had_pending = pending.is_some();

        let newly_approved = match verdict {
            Verdict::Approve => state.approved.insert(identity),
            Verdict::Reject => false,
        };

        DecisionOutcome {
            identity,
            verdict,
            profile: pending.map(|request| request.profile).unwrap_or_default(),
            had_pending,
            applied: had_pending || newly_approved,
        }
    }

    fn is_approved(&self, identity: Identity) -> bool {
        self.lock().approved.contains(&identity)
    }

    fn is_pending(&self, identity: Identity) -> bool {
        self.lock().pending.contains_key(&identity)
    }

    fn snapshot(&self) -> ApprovalSnapshot {
        let state = self.lock();
        ApprovalSnapshot { pending: state.pending.len(), approved: state.approved.len() }
    }
}
