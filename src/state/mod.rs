// State management module
//
// This module provides the StateManager which wraps a ScanSession with thread-safe access
// using Arc<RwLock<T>> and emits change events for presentation updates.

use crate::metrics::Metrics;
use crate::models::{DetectionResult, ScanSession, ScanState};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when the session is modified
///
/// These events are emitted to notify interested parties (primarily the
/// screen presenters) about transitions without requiring them to poll.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A new scan entered `Scanning`
    ScanStarted { session_id: u64 },

    /// Progress moved while scanning
    ProgressUpdated { session_id: u64, progress: u8 },

    /// The scan reached 100% and a result was attached
    ScanCompleted {
        session_id: u64,
        result: DetectionResult,
    },

    /// The scan was stopped before completion
    ScanCancelled { session_id: u64 },

    /// The Result Catalog failed at 100%
    ScanFailed { session_id: u64, reason: String },

    /// A terminal session was dismissed back to `Idle`
    SessionReset,
}

/// Thread-safe session holder with event emission
///
/// This is the state component behind every
/// [`ScanSessionController`](crate::services::ScanSessionController):
/// - Provides thread-safe access to [`ScanSession`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// Every mutation goes through [`update()`](Self::update), so the change
/// check and the mutation happen under the same write lock. The progress
/// clock relies on this to drop ticks that belong to a cancelled scan.
///
/// Each controller owns its own manager; managers share nothing unless
/// explicitly cloned.
pub struct StateManager {
    /// The session protected by RwLock for thread-safe access
    state: Arc<RwLock<ScanSession>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    metrics: Option<Arc<Metrics>>,
}

impl StateManager {
    /// Create a new StateManager with an idle session
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ScanSession::default())),
            state_tx,
            metrics: None,
        }
    }

    /// Create a StateManager that records broadcasts into `metrics`
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new()
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, ScanSession> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, ScanSession> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a copy of the current session
    pub fn snapshot(&self) -> ScanSession {
        self.read_lock().clone()
    }

    /// Execute a function with read access to the session
    ///
    /// # Example
    /// ```ignore
    /// let progress = state_manager.read(|session| session.progress());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ScanSession) -> R,
    {
        let session = self.read_lock();
        f(&session)
    }

    /// Update the session and emit change events
    ///
    /// This is the only way to modify the session. It:
    /// 1. Captures the old session
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// The update function's return value and the emitted events
    pub fn update<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut ScanSession) -> R,
    {
        let mut session = self.write_lock();
        let old_session = session.clone();

        let outcome = update_fn(&mut session);

        let changes = Self::detect_changes(&old_session, &session);

        for change in &changes {
            self.broadcast(change.clone());
        }

        (outcome, changes)
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    /// Multiple subscribers can listen simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn broadcast(&self, change: StateChange) {
        // Sending with no subscriber is not a failure
        let sent = self.state_tx.send(change).is_ok();

        if let Some(metrics) = &self.metrics {
            if sent {
                metrics.record_state_broadcast();
            } else {
                metrics.record_state_broadcast_unheard();
            }
        }
    }

    /// Detect what changed between two sessions and generate events
    fn detect_changes(old: &ScanSession, new: &ScanSession) -> Vec<StateChange> {
        let mut changes = Vec::new();
        let session_id = new.session_id();

        let restarted = old.session_id() != new.session_id();

        if old.state() != new.state() || restarted {
            match new.state() {
                ScanState::Scanning => changes.push(StateChange::ScanStarted { session_id }),
                ScanState::Completed => {
                    if let Some(result) = new.result() {
                        changes.push(StateChange::ScanCompleted {
                            session_id,
                            result: result.clone(),
                        });
                    }
                }
                ScanState::Cancelled => changes.push(StateChange::ScanCancelled { session_id }),
                ScanState::Failed { reason } => changes.push(StateChange::ScanFailed {
                    session_id,
                    reason: reason.clone(),
                }),
                ScanState::Idle => changes.push(StateChange::SessionReset),
            }
        }

        // Progress is only reported while it means something
        if new.is_scanning() && (old.progress() != new.progress() || restarted) {
            changes.push(StateChange::ProgressUpdated {
                session_id,
                progress: new.progress(),
            });
        }

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("session", &*self.read_lock())
            .field("subscribers", &self.state_tx.receiver_count())
            .finish()
    }
}

// Clones share the same session and channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Macronutrients;
    use std::sync::atomic::Ordering;

    fn sample_result() -> DetectionResult {
        DetectionResult {
            label: "Banana".to_string(),
            confidence_score: 88,
            estimated_calories: 105,
            estimated_weight_grams: 118,
            macronutrients: Macronutrients {
                carbs_grams: 27,
                protein_grams: 1,
                fat_grams: 0,
                fiber_grams: 3,
            },
            health_score: None,
        }
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let session = manager.snapshot();

        assert_eq!(session.state(), &ScanState::Idle);
        assert_eq!(session.progress(), 0);
        assert!(session.result().is_none());
    }

    #[test]
    fn test_begin_emits_started() {
        let manager = StateManager::new();

        let (began, changes) = manager.update(|s| s.begin());

        assert!(began);
        assert_eq!(changes, vec![
            StateChange::ScanStarted { session_id: 1 },
            StateChange::ProgressUpdated { session_id: 1, progress: 0 },
        ]);
    }

    #[test]
    fn test_advance_emits_progress_only() {
        let manager = StateManager::new();
        manager.update(|s| s.begin());

        let (_, changes) = manager.update(|s| s.advance(1, 5));

        assert_eq!(changes, vec![StateChange::ProgressUpdated {
            session_id: 1,
            progress: 5
        }]);
    }

    #[test]
    fn test_rejected_update_emits_nothing() {
        let manager = StateManager::new();

        let (cancelled, changes) = manager.update(|s| s.cancel());

        assert!(!cancelled);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_completion_event_carries_result() {
        let manager = StateManager::new();
        manager.update(|s| s.begin());
        manager.update(|s| s.advance(1, 100));

        let (_, changes) = manager.update(|s| s.complete(1, sample_result()));

        assert_eq!(changes.len(), 1);
        match &changes[0] {
            StateChange::ScanCompleted { session_id, result } => {
                assert_eq!(*session_id, 1);
                assert_eq!(result.label, "Banana");
            }
            other => panic!("Expected ScanCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_restart_from_completed_emits_started_and_progress() {
        let manager = StateManager::new();
        manager.update(|s| s.begin());
        manager.update(|s| s.advance(1, 100));
        manager.update(|s| s.complete(1, sample_result()));

        let (_, changes) = manager.update(|s| s.begin());

        assert!(matches!(changes[0], StateChange::ScanStarted { session_id: 2 }));
        assert!(matches!(
            changes[1],
            StateChange::ProgressUpdated { session_id: 2, progress: 0 }
        ));
        assert!(manager.snapshot().result().is_none());
    }

    #[test]
    fn test_cancel_and_reset_events() {
        let manager = StateManager::new();
        manager.update(|s| s.begin());

        let (_, changes) = manager.update(|s| s.cancel());
        assert_eq!(changes, vec![StateChange::ScanCancelled { session_id: 1 }]);

        let (_, changes) = manager.update(|s| s.reset());
        assert_eq!(changes, vec![StateChange::SessionReset]);
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.update(|s| s.begin());

        let event = rx.try_recv();
        assert!(matches!(event, Ok(StateChange::ScanStarted { .. })));
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.update(|s| s.begin());

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_read_with_closure() {
        let manager = StateManager::new();
        manager.update(|s| {
            s.begin();
            s.advance(1, 42)
        });

        let progress = manager.read(|s| s.progress());
        assert_eq!(progress, 42);
    }

    #[test]
    fn test_clone_shares_session() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.update(|s| s.begin());

        assert!(manager2.snapshot().is_scanning());
    }

    #[test]
    fn test_broadcast_metrics() {
        let metrics = Arc::new(Metrics::new());
        let manager = StateManager::with_metrics(Arc::clone(&metrics));

        // No subscribers yet: begin emits ScanStarted and ProgressUpdated
        manager.update(|s| s.begin());
        assert_eq!(metrics.state_broadcasts_unheard.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.state_broadcasts.load(Ordering::Relaxed), 0);

        let _rx = manager.subscribe();
        manager.update(|s| s.advance(1, 5));
        assert_eq!(metrics.state_broadcasts.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.state_broadcasts_unheard.load(Ordering::Relaxed), 2);
    }
}
