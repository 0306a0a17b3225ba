//! Per-session turn gate using a tokio Semaphore.
//!
//! A session runs at most one turn at a time. The HTTP surface never queues
//! behind a running turn: it calls `try_begin()` and refuses when busy.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A single-permit gate owned by one session.
#[derive(Clone)]
pub struct TurnGate {
    semaphore: Arc<Semaphore>,
}

/// Held for the duration of one turn; releasing it reopens the gate.
pub struct TurnPermit {
    _permit: OwnedSemaphorePermit,
    started: Instant,
}

impl Drop for TurnPermit {
    fn drop(&mut self) {
        debug!(elapsed_ms = self.started.elapsed().as_millis() as u64, "turn finished");
    }
}

impl TurnGate {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Start a turn, or `None` if one is already in flight.
    pub fn try_begin(&self) -> Option<TurnPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(TurnPermit {
            _permit: permit,
            started: Instant::now(),
        })
    }

    /// Returns `true` while a turn holds the permit.
    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_turn_is_refused() {
        let gate = TurnGate::new();
        assert!(!gate.is_busy());

        let turn = gate.try_begin().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_begin().is_none());

        drop(turn);
        assert!(!gate.is_busy());
        assert!(gate.try_begin().is_some());
    }

    #[tokio::test]
    async fn permit_can_move_across_tasks() {
        let gate = TurnGate::new();
        let turn = gate.try_begin().unwrap();

        let handle = tokio::spawn(async move {
            let _turn = turn;
            tokio::task::yield_now().await;
        });
        handle.await.unwrap();
        assert!(!gate.is_busy());
    }

    #[test]
    fn clones_share_state() {
        let gate1 = TurnGate::new();
        let gate2 = gate1.clone();

        let _turn = gate1.try_begin();
        assert!(gate2.is_busy());
        assert!(gate2.try_begin().is_none());
    }
}
