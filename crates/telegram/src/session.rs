use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use paygate_core::flows::SessionState;
use paygate_core::Identity;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SessionSlot = Arc<AsyncMutex<SessionState>>;

/// Per-identity dialog state.
///
/// Each identity owns one slot; holding its guard serializes all event handling for that
/// identity while different identities proceed independently.
#[derive(Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<Identity, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, identity: Identity) -> OwnedMutexGuard<SessionState> {
        let slot = {
            let mut slots = self.lock();
            Arc::clone(slots.entry(identity).or_default())
        };
        slot.lock_owned().await
    }

    /// Returns the guard and drops the slot once it is idle and nobody else holds or awaits it.
    pub fn release(&self, identity: Identity, guard: OwnedMutexGuard<SessionState>) {
        let idle = guard.is_idle();
        drop(guard);
        if !idle {
            return;
        }

        let mut slots = self.lock();
        let unused = slots.get(&identity).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|state| state.is_idle())
        });
        if unused {
            slots.remove(&identity);
        }
    }

    /// Current state without waiting; `None` while an event for the identity is in flight.
    /// Identities without a slot are idle.
    pub fn peek(&self, identity: Identity) -> Option<SessionState> {
        let Some(slot) = self.lock().get(&identity).cloned() else {
            return Some(SessionState::Idle);
        };
        let state = slot.try_lock().ok()?;
        Some(state.clone())
    }

    pub fn slot_count(&self) -> usize {
        self.lock().len()
    }

    /// Identities with a dialog in progress. Slots locked by an in-flight event count as active.
    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| slot.try_lock().map_or(true, |state| !state.is_idle()))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Identity, SessionSlot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use paygate_core::flows::SessionState;
    use paygate_core::Identity;

    use super::SessionRegistry;

    #[tokio::test]
    async fn new_identities_start_idle() {
        let registry = SessionRegistry::new();

        let state = registry.acquire(Identity(1)).await;

        assert_eq!(*state, SessionState::Idle);
    }

    #[tokio::test]
    async fn state_persists_between_acquisitions() {
        let registry = SessionRegistry::new();
        *registry.acquire(Identity(1)).await = SessionState::AwaitingIds;

        assert_eq!(registry.peek(Identity(1)), Some(SessionState::AwaitingIds));
        assert_eq!(registry.peek(Identity(2)), Some(SessionState::Idle));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn idle_slots_are_dropped_on_release() {
        let registry = SessionRegistry::new();

        let mut state = registry.acquire(Identity(1)).await;
        *state = SessionState::AwaitingIds;
        registry.release(Identity(1), state);
        assert_eq!(registry.slot_count(), 1);

        let mut state = registry.acquire(Identity(1)).await;
        *state = SessionState::Idle;
        registry.release(Identity(1), state);
        assert_eq!(registry.slot_count(), 0);
        assert_eq!(registry.peek(Identity(1)), Some(SessionState::Idle));
    }

    #[tokio::test]
    async fn release_keeps_a_slot_another_event_is_waiting_on() {
        let registry = Arc::new(SessionRegistry::new());
        let held = registry.acquire(Identity(1)).await;

        let waiting = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut state = registry.acquire(Identity(1)).await;
                *state = SessionState::AwaitingTargetId;
                registry.release(Identity(1), state);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.release(Identity(1), held);
        waiting.await.expect("waiting task completes");

        assert_eq!(registry.slot_count(), 1);
        assert_eq!(registry.peek(Identity(1)), Some(SessionState::AwaitingTargetId));
    }

    #[tokio::test]
    async fn same_identity_is_serialized_while_others_proceed() {
        let registry = Arc::new(SessionRegistry::new());
        let held = registry.acquire(Identity(1)).await;

        let blocked = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut state = registry.acquire(Identity(1)).await;
                *state = SessionState::AwaitingTargetId;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let other = tokio::time::timeout(Duration::from_millis(200), registry.acquire(Identity(2)))
            .await
            .expect("other identity is not blocked");
        drop(other);

        drop(held);
        blocked.await.expect("blocked task completes");
        assert_eq!(registry.peek(Identity(1)), Some(SessionState::AwaitingTargetId));
    }
}
