//! Reconnection grace timer.
//!
//! A transient network drop must not void minutes of capture work, so
//! a disconnect arms a one-shot timer instead of tearing down. If the
//! client rebinds before it fires, the registry clears the grace flag
//! and bumps the disconnect epoch, and this timer becomes a no-op.
//! Each disconnect arms a fresh timer with its own epoch; only the
//! timer holding the latest epoch can act.

use crate::registry::{schedule_destroy, SessionRegistry, SessionState};
use std::sync::Arc;
use std::time::Duration;
use whorlproto::SessionId;

pub fn spawn_grace_timer(
    registry: Arc<SessionRegistry>,
    session_id: SessionId,
    epoch: u64,
    grace_period: Duration,
    teardown_delay: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(grace_period).await;
        if !registry.abandon_if_unbound(&session_id, epoch) {
            return;
        }
        tracing::info!(session_id = %session_id, "session abandoned, no reconnect within grace period");
        // The cancel signal is already set; the runner observes it at
        // its next safe point. Mark the state here in case the loop is
        // parked inside a long hardware wait.
        registry.set_state(&session_id, SessionState::Cancelled);
        schedule_destroy(registry, session_id, teardown_delay);
    })
}
