//! Session registry - the single mutex-guarded slot for the one
//! active enrollment session.
//!
//! The physical scanner is an exclusively owned device, so at most
//! one non-idle session exists at a time. Every field access happens
//! under one coarse mutex; no operation holds the lock across a
//! blocking hardware or network call - state is copied out, the lock
//! released, then action taken. Background tasks (session runner,
//! expiration watchdog, grace timer) re-check the session id before
//! mutating, so a stale task can never corrupt a newer session.

use crate::driver::Artifact;
use crate::error::SessionError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use whorlproto::{
    CaptureMetrics, ExpiryReason, FingerName, ScanStatus, ServerEvent, SessionId, StatusSnapshot,
};

/// A bound realtime connection: identity plus the outbound event
/// channel owned by the transport layer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }
}

/// Timing windows driving expiration, grace, and teardown.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub max_lifetime: Duration,
    pub inactivity_timeout: Duration,
    pub watchdog_interval: Duration,
    pub grace_period: Duration,
    pub teardown_delay: Duration,
}

impl From<&whorlconf::SessionConfig> for SessionTiming {
    fn from(config: &whorlconf::SessionConfig) -> Self {
        Self {
            max_lifetime: Duration::from_secs(config.max_lifetime_secs),
            inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
            watchdog_interval: Duration::from_secs(config.watchdog_interval_secs),
            grace_period: Duration::from_secs(config.grace_period_secs),
            teardown_delay: Duration::from_secs(config.teardown_delay_secs),
        }
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::from(&whorlconf::SessionConfig::default())
    }
}

/// Non-idle session states. Idle is the empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Completed,
    Cancelled,
    Error,
}

/// Transitions are monotone: Active -> {Completed, Cancelled, Error},
/// terminal states only leave via destroy.
fn transition_allowed(from: SessionState, to: SessionState) -> bool {
    matches!(
        (from, to),
        (
            SessionState::Active,
            SessionState::Completed | SessionState::Cancelled | SessionState::Error
        )
    )
}

/// Most recent progress emission, kept for resend-on-reconnect and
/// the fallback poller.
#[derive(Debug, Clone)]
struct LastStatus {
    finger: FingerName,
    status: ScanStatus,
    hint: Option<String>,
    metrics: Option<CaptureMetrics>,
}

/// The one active enrollment session.
struct EnrollSession {
    id: SessionId,
    participant_ref: String,
    connection: Option<ConnectionHandle>,
    finger_queue: Vec<FingerName>,
    current_index: usize,
    captured: HashMap<FingerName, Artifact>,
    state: SessionState,
    last_status: Option<LastStatus>,
    last_preview: Option<String>,
    created_at: Instant,
    last_activity_at: Instant,
    grace_active: bool,
    disconnect_epoch: u64,
    cancel: CancellationToken,
}

/// Read-only view of session progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub current_index: usize,
    pub captured: usize,
    pub total: usize,
    pub state: SessionState,
}

/// The registry: one slot, one mutex.
pub struct SessionRegistry {
    slot: Mutex<Option<EnrollSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Allocate the active session. Fails while any session exists.
    pub fn create(
        &self,
        connection: ConnectionHandle,
        participant_ref: String,
        finger_queue: Vec<FingerName>,
    ) -> Result<SessionId, SessionError> {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let id = SessionId::generate();
        let now = Instant::now();
        *slot = Some(EnrollSession {
            id: id.clone(),
            participant_ref,
            connection: Some(connection),
            finger_queue,
            current_index: 0,
            captured: HashMap::new(),
            state: SessionState::Active,
            last_status: None,
            last_preview: None,
            created_at: now,
            last_activity_at: now,
            grace_active: false,
            disconnect_epoch: 0,
            cancel: CancellationToken::new(),
        });
        drop(slot);

        tracing::info!(session_id = %id, "session created");
        Ok(id)
    }

    /// Refresh the inactivity clock. Called on inbound commands and
    /// outbound progress emissions, never from background ticks.
    pub fn touch_activity(&self, id: &SessionId) {
        let mut slot = self.slot.lock().unwrap();
        if let Some(session) = slot.as_mut().filter(|s| &s.id == id) {
            session.last_activity_at = Instant::now();
        }
    }

    /// Finger at the cursor, i.e. the one to capture next.
    pub fn current_finger(&self, id: &SessionId) -> Option<FingerName> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|s| &s.id == id)
            .and_then(|s| s.finger_queue.get(s.current_index).cloned())
    }

    /// Commit a captured artifact for the finger at the cursor and
    /// move the cursor past it, in one lock hold, so no reader ever
    /// observes the captured count and the cursor out of step.
    ///
    /// A commit for any other finger (duplicate success event, or an
    /// out-of-order retry) is ignored with a log line and the cursor
    /// stays put. Returns the finger now at the cursor, or None when
    /// the queue is exhausted or the session is gone.
    pub fn commit_capture(
        &self,
        id: &SessionId,
        finger: &FingerName,
        artifact: Artifact,
    ) -> Option<FingerName> {
        let mut slot = self.slot.lock().unwrap();
        let Some(session) = slot.as_mut().filter(|s| &s.id == id) else {
            tracing::warn!(session_id = %id, finger = %finger, "capture commit for defunct session ignored");
            return None;
        };
        match session.finger_queue.get(session.current_index) {
            Some(expected) if expected == finger => {
                session.captured.insert(finger.clone(), artifact);
                session.current_index += 1;
                session.last_activity_at = Instant::now();
            }
            expected => {
                tracing::warn!(
                    session_id = %id,
                    finger = %finger,
                    expected = ?expected,
                    "duplicate or out-of-order capture commit ignored"
                );
            }
        }
        session.finger_queue.get(session.current_index).cloned()
    }

    /// Apply a state transition. Illegal transitions are rejected and
    /// logged, not raised - races between a watchdog and normal
    /// completion are expected.
    pub fn set_state(&self, id: &SessionId, to: SessionState) -> bool {
        let mut slot = self.slot.lock().unwrap();
        let Some(session) = slot.as_mut().filter(|s| &s.id == id) else {
            tracing::debug!(session_id = %id, to = ?to, "state change for defunct session ignored");
            return false;
        };
        if !transition_allowed(session.state, to) {
            tracing::warn!(
                session_id = %id,
                from = ?session.state,
                to = ?to,
                "illegal state transition rejected"
            );
            return false;
        }
        session.state = to;
        true
    }

    /// Set the cooperative cancel signal for a matching session.
    pub fn request_cancel(&self, id: &SessionId) -> Result<(), SessionError> {
        let slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(session) if &session.id == id => {
                session.cancel.cancel();
                Ok(())
            }
            _ => Err(SessionError::SessionMismatch { given: id.clone() }),
        }
    }

    pub fn cancel_token(&self, id: &SessionId) -> Option<CancellationToken> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|s| &s.id == id)
            .map(|s| s.cancel.clone())
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref().map(|s| s.id.clone())
    }

    pub fn finger_queue(&self, id: &SessionId) -> Option<Vec<FingerName>> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|s| &s.id == id)
            .map(|s| s.finger_queue.clone())
    }

    pub fn participant_ref(&self, id: &SessionId) -> Option<String> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|s| &s.id == id)
            .map(|s| s.participant_ref.clone())
    }

    pub fn progress(&self, id: &SessionId) -> Option<SessionProgress> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref().filter(|s| &s.id == id).map(|s| SessionProgress {
            current_index: s.current_index,
            captured: s.captured.len(),
            total: s.finger_queue.len(),
            state: s.state,
        })
    }

    /// Check both expiration policies. Absolute lifetime wins when
    /// both windows are exceeded.
    pub fn check_expiry(&self, id: &SessionId, timing: &SessionTiming) -> Option<ExpiryReason> {
        let slot = self.slot.lock().unwrap();
        let session = slot.as_ref().filter(|s| &s.id == id)?;
        let now = Instant::now();
        if now.duration_since(session.created_at) > timing.max_lifetime {
            Some(ExpiryReason::MaxLifetimeReached)
        } else if now.duration_since(session.last_activity_at) > timing.inactivity_timeout {
            Some(ExpiryReason::InactivityTimeout)
        } else {
            None
        }
    }

    /// Bind a new connection to the existing session (reconnect),
    /// clearing any pending grace period. Returns the events to
    /// replay to the new connection.
    pub fn rebind(&self, connection: ConnectionHandle) -> Option<(SessionId, Vec<ServerEvent>)> {
        let mut slot = self.slot.lock().unwrap();
        let session = slot.as_mut()?;
        let was_grace = session.grace_active;
        session.connection = Some(connection);
        session.grace_active = false;
        session.last_activity_at = Instant::now();

        let mut replay = Vec::new();
        if let Some(last) = &session.last_status {
            replay.push(ServerEvent::ScannerStatus {
                session_id: session.id.clone(),
                finger_name: last.finger.clone(),
                status: last.status,
                hint: last.hint.clone(),
                metrics: last.metrics,
            });
        }
        if let Some(frame) = &session.last_preview {
            replay.push(ServerEvent::PreviewFrame {
                session_id: session.id.clone(),
                frame_data: frame.clone(),
            });
        }

        tracing::info!(
            session_id = %session.id,
            grace_cleared = was_grace,
            replayed = replay.len(),
            "connection bound to session"
        );
        Some((session.id.clone(), replay))
    }

    /// Unbind on disconnect of the bound connection. Starts the grace
    /// bookkeeping and returns the disconnect epoch the grace timer
    /// must present to act.
    pub fn mark_disconnected(&self, conn_id: Uuid) -> Option<(SessionId, u64)> {
        let mut slot = self.slot.lock().unwrap();
        let session = slot.as_mut()?;
        if session.connection.as_ref().map(|c| c.id) != Some(conn_id) {
            return None;
        }
        session.connection = None;
        session.grace_active = true;
        session.disconnect_epoch += 1;
        tracing::info!(
            session_id = %session.id,
            epoch = session.disconnect_epoch,
            "connection lost, grace period started"
        );
        Some((session.id.clone(), session.disconnect_epoch))
    }

    /// Grace timer firing: abandon only if the session is still
    /// unbound and no newer disconnect superseded this timer.
    pub fn abandon_if_unbound(&self, id: &SessionId, epoch: u64) -> bool {
        let slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(session)
                if &session.id == id
                    && session.grace_active
                    && session.disconnect_epoch == epoch =>
            {
                session.cancel.cancel();
                tracing::info!(session_id = %id, "grace period elapsed without reconnect");
                true
            }
            _ => false,
        }
    }

    pub fn grace_active(&self, id: &SessionId) -> bool {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|s| &s.id == id)
            .map(|s| s.grace_active)
            .unwrap_or(false)
    }

    /// Record an outbound emission (for the fallback poller and
    /// reconnect replay) and hand back the bound connection's sender.
    /// Progress emissions refresh the inactivity clock.
    pub fn store_emission(&self, event: &ServerEvent) -> Option<mpsc::UnboundedSender<ServerEvent>> {
        let mut slot = self.slot.lock().unwrap();
        let session = slot.as_mut()?;
        if event.session_id() != Some(&session.id) {
            return None;
        }
        match event {
            ServerEvent::ScannerStatus {
                finger_name,
                status,
                hint,
                metrics,
                ..
            } => {
                session.last_status = Some(LastStatus {
                    finger: finger_name.clone(),
                    status: *status,
                    hint: hint.clone(),
                    metrics: *metrics,
                });
                session.last_activity_at = Instant::now();
            }
            ServerEvent::PreviewFrame { frame_data, .. } => {
                session.last_preview = Some(frame_data.clone());
                session.last_activity_at = Instant::now();
            }
            _ => {}
        }
        session.connection.as_ref().map(|c| c.tx.clone())
    }

    /// Immutable copy of status fields only. Never exposes artifacts.
    pub fn snapshot(&self) -> StatusSnapshot {
        let slot = self.slot.lock().unwrap();
        let Some(session) = slot.as_ref() else {
            return StatusSnapshot::idle();
        };
        let mut snap = StatusSnapshot::idle();
        snap.session_id = Some(session.id.clone());
        match &session.last_status {
            Some(last) => {
                snap.finger_name = Some(last.finger.clone());
                snap.status = last.status;
                snap.hint = last.hint.clone();
                snap.metrics = last.metrics;
            }
            None => {
                snap.finger_name = session.finger_queue.get(session.current_index).cloned();
            }
        }
        snap.last_preview = session.last_preview.clone();
        snap
    }

    /// The sole teardown choke point. Sets the cancel signal, drops
    /// captured artifacts and the last preview, and resets the slot
    /// to idle. Safe to call repeatedly and concurrently; the bound
    /// watchdog and grace timer self-terminate on the resulting id
    /// mismatch.
    pub fn destroy(&self, id: &SessionId) -> bool {
        let mut slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(session) if &session.id == id => {}
            _ => return false,
        }
        let session = slot.take().expect("slot checked above");
        drop(slot);

        session.cancel.cancel();
        tracing::info!(
            session_id = %id,
            state = ?session.state,
            fingerprints_cleared = session.captured.len(),
            "session destroyed, captures cleared"
        );
        true
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tear the session down after a short delay, giving a slow client
/// time to receive the terminal event before state is wiped.
pub fn schedule_destroy(registry: Arc<SessionRegistry>, id: SessionId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        registry.destroy(&id);
    });
}
