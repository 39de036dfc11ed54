//! Expiration watchdog.
//!
//! One watchdog task per session, spawned alongside the runner. It
//! wakes on a fixed interval, checks both expiration policies, and on
//! expiry announces the reason and tears the session down immediately.
//! Expiry is a privacy deadline, not a UX nicety, so teardown here
//! skips the usual grace delay.

use crate::events::EventSink;
use crate::registry::{SessionRegistry, SessionState, SessionTiming};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use whorlproto::{ServerEvent, SessionId};

pub fn spawn_watchdog(
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn EventSink>,
    session_id: SessionId,
    timing: SessionTiming,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(timing.watchdog_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // first tick completes immediately

        loop {
            ticker.tick().await;
            if registry.current_session_id().as_ref() != Some(&session_id) {
                tracing::debug!(session_id = %session_id, "watchdog winding down, session gone");
                return;
            }
            let Some(reason) = registry.check_expiry(&session_id, &timing) else {
                continue;
            };

            tracing::info!(session_id = %session_id, reason = %reason, "session expired");
            // The emission must land before the slot is wiped, or the
            // registry will refuse to route it.
            if registry.set_state(&session_id, SessionState::Error) {
                sink.emit(ServerEvent::SessionExpired {
                    session_id: session_id.clone(),
                    reason,
                });
            }
            registry.destroy(&session_id);
            return;
        }
    })
}
