//! Per-worker local state: the single unit-of-work slot.
//!
//! `SharedState` is the one place the busy flag lives. It is mutated only on
//! coordinator-owned paths (dispatch accept, unit finish, shutdown) and read
//! across tasks by the availability broadcaster, so all access goes through
//! one mutex.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the worker state, as published in `worker_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub busy: bool,
    pub current_unit_id: Option<String>,
}

#[derive(Debug)]
struct StateInner {
    busy: bool,
    current_unit_id: Option<String>,
    idle_since: DateTime<Utc>,
}

/// Mutex-guarded worker state, cheap to clone across tasks.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<StateInner>>,
}

impl SharedState {
    /// Fresh idle state, available as of now.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StateInner {
                busy: false,
                current_unit_id: None,
                idle_since: Utc::now(),
            })),
        }
    }

    pub fn busy(&self) -> bool {
        self.lock().busy
    }

    pub fn current_unit_id(&self) -> Option<String> {
        self.lock().current_unit_id.clone()
    }

    /// When the worker last became idle (process start or last unit finish).
    pub fn idle_since(&self) -> DateTime<Utc> {
        self.lock().idle_since
    }

    /// Claim the unit slot for `unit_id`.
    ///
    /// Returns false without touching anything if the slot is already taken.
    pub fn begin_unit(&self, unit_id: &str) -> bool {
        let mut inner = self.lock();
        if inner.busy {
            return false;
        }
        inner.busy = true;
        inner.current_unit_id = Some(unit_id.to_string());
        true
    }

    /// Release the unit slot. Idempotent.
    pub fn finish_unit(&self) {
        let mut inner = self.lock();
        if inner.busy {
            inner.busy = false;
            inner.current_unit_id = None;
            inner.idle_since = Utc::now();
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        StateSnapshot {
            busy: inner.busy,
            current_unit_id: inner.current_unit_id.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        // A poisoned lock means another task panicked mid-update; the state
        // transitions are single-field writes, so the data is still coherent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let state = SharedState::new();
        assert!(!state.busy());
        assert!(state.current_unit_id().is_none());
    }

    #[test]
    fn test_begin_unit_claims_slot_once() {
        let state = SharedState::new();
        assert!(state.begin_unit("u-1"));
        assert!(state.busy());
        assert_eq!(state.current_unit_id().as_deref(), Some("u-1"));

        // Second claim is rejected and does not overwrite the unit id.
        assert!(!state.begin_unit("u-2"));
        assert_eq!(state.current_unit_id().as_deref(), Some("u-1"));
    }

    #[test]
    fn test_finish_unit_releases_and_is_idempotent() {
        let state = SharedState::new();
        state.begin_unit("u-1");
        state.finish_unit();
        assert!(!state.busy());
        assert!(state.current_unit_id().is_none());

        state.finish_unit();
        assert!(!state.busy());
    }

    #[test]
    fn test_finish_unit_advances_idle_since() {
        let state = SharedState::new();
        let initial = state.idle_since();
        state.begin_unit("u-1");
        state.finish_unit();
        assert!(state.idle_since() >= initial);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let state = SharedState::new();
        state.begin_unit("u-9");
        let value = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(value["busy"], true);
        assert_eq!(value["currentUnitId"], "u-9");
    }
}
