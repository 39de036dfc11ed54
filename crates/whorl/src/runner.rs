//! Per-session capture loop.
//!
//! One task per session, spawned at start and alive until a terminal
//! state. It walks the finger queue strictly in order: capture, commit,
//! advance, repeat. It never talks to a transport directly; progress
//! goes through the event sink and all state changes through the
//! registry, so a session whose slot was torn down mid-step simply
//! winds down on the next registry call.

use crate::driver::{CaptureDriver, CaptureOutcome, CaptureProgress, ProgressSink};
use crate::error::SessionError;
use crate::events::EventSink;
use crate::registry::{schedule_destroy, SessionRegistry, SessionState};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use whorlproto::{FingerName, ScanStatus, ServerEvent, SessionId};

/// Adapter translating driver progress into channel events for one
/// capture step.
struct StepSink<'a> {
    sink: &'a dyn EventSink,
    session_id: &'a SessionId,
    finger: &'a FingerName,
}

impl ProgressSink for StepSink<'_> {
    fn progress(&self, update: CaptureProgress) {
        match update {
            CaptureProgress::Status {
                status,
                hint,
                metrics,
            } => self.sink.emit(ServerEvent::ScannerStatus {
                session_id: self.session_id.clone(),
                finger_name: self.finger.clone(),
                status,
                hint,
                metrics,
            }),
            CaptureProgress::Preview { frame } => self.sink.emit(ServerEvent::PreviewFrame {
                session_id: self.session_id.clone(),
                frame_data: base64::engine::general_purpose::STANDARD.encode(frame),
            }),
        }
    }
}

/// Spawn the capture loop under a supervisor. A panic inside the
/// loop (a misbehaving driver impl) must not leave the session
/// Active with the client hearing nothing until the watchdog fires:
/// the supervisor maps it to state Error with the generic internal
/// hint and tears the session down.
pub fn spawn_session(
    registry: Arc<SessionRegistry>,
    driver: Arc<dyn CaptureDriver>,
    sink: Arc<dyn EventSink>,
    session_id: SessionId,
    teardown_delay: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let task = tokio::spawn(run_session(
            registry.clone(),
            driver,
            sink.clone(),
            session_id.clone(),
            teardown_delay,
        ));
        let Err(join_err) = task.await else {
            return;
        };

        let err = SessionError::Internal(join_err.to_string());
        tracing::error!(
            session_id = %session_id,
            detail = err.detail().unwrap_or_default(),
            "session task aborted, ending session"
        );
        if registry.set_state(&session_id, SessionState::Error) {
            let finger = registry
                .current_finger(&session_id)
                .unwrap_or_else(|| FingerName::new("unknown"));
            sink.emit(ServerEvent::ScannerStatus {
                session_id: session_id.clone(),
                finger_name: finger,
                status: ScanStatus::Error,
                hint: Some(err.hint()),
                metrics: None,
            });
            schedule_destroy(registry, session_id, teardown_delay);
        }
    })
}

/// Drive one session from its first finger to a terminal state.
pub async fn run_session(
    registry: Arc<SessionRegistry>,
    driver: Arc<dyn CaptureDriver>,
    sink: Arc<dyn EventSink>,
    session_id: SessionId,
    teardown_delay: Duration,
) {
    while let Some(finger) = registry.current_finger(&session_id) {
        let Some(cancel) = registry.cancel_token(&session_id) else {
            return;
        };
        if cancel.is_cancelled() {
            finish_cancelled(&registry, &*sink, &session_id, &finger, teardown_delay);
            return;
        }

        sink.emit(ServerEvent::ScannerStatus {
            session_id: session_id.clone(),
            finger_name: finger.clone(),
            status: ScanStatus::Waiting,
            hint: None,
            metrics: None,
        });

        let step = StepSink {
            sink: &*sink,
            session_id: &session_id,
            finger: &finger,
        };
        match driver.capture_finger(&finger, &cancel, &step).await {
            Ok(CaptureOutcome::Captured(artifact)) => {
                sink.emit(ServerEvent::ScannerStatus {
                    session_id: session_id.clone(),
                    finger_name: finger.clone(),
                    status: ScanStatus::Success,
                    hint: None,
                    metrics: Some(artifact.metrics),
                });
                registry.commit_capture(&session_id, &finger, artifact);
            }
            Ok(CaptureOutcome::Cancelled) => {
                finish_cancelled(&registry, &*sink, &session_id, &finger, teardown_delay);
                return;
            }
            Err(err) => {
                let session_err = SessionError::CaptureFailure {
                    finger: finger.clone(),
                    detail: err.to_string(),
                };
                tracing::error!(
                    session_id = %session_id,
                    finger = %finger,
                    detail = session_err.detail().unwrap_or_default(),
                    "capture step failed, ending session"
                );
                if registry.set_state(&session_id, SessionState::Error) {
                    sink.emit(ServerEvent::ScannerStatus {
                        session_id: session_id.clone(),
                        finger_name: finger,
                        status: ScanStatus::Error,
                        hint: Some(session_err.hint()),
                        metrics: None,
                    });
                    schedule_destroy(registry, session_id, teardown_delay);
                }
                return;
            }
        }
    }

    // Queue exhausted. The completion gate loses to any concurrent
    // terminal transition (expiry, cancel), in which case that path
    // already announced the outcome.
    let finger_names = registry.finger_queue(&session_id).unwrap_or_default();
    if registry.set_state(&session_id, SessionState::Completed) {
        tracing::info!(
            session_id = %session_id,
            total = finger_names.len(),
            "enrollment complete"
        );
        sink.emit(ServerEvent::SessionComplete {
            session_id: session_id.clone(),
            total_captured: finger_names.len(),
            finger_names,
        });
        schedule_destroy(registry, session_id, teardown_delay);
    }
}

/// Cooperative cancellation observed mid-loop. The path that set the
/// cancel signal (gateway cancel, grace abandonment, teardown) owns
/// the terminal announcement; the runner only records the state in
/// case nobody else did and emits the step-level status.
fn finish_cancelled(
    registry: &Arc<SessionRegistry>,
    sink: &dyn EventSink,
    session_id: &SessionId,
    finger: &FingerName,
    teardown_delay: Duration,
) {
    sink.emit(ServerEvent::ScannerStatus {
        session_id: session_id.clone(),
        finger_name: finger.clone(),
        status: ScanStatus::Cancelled,
        hint: None,
        metrics: None,
    });
    if registry.set_state(session_id, SessionState::Cancelled) {
        schedule_destroy(registry.clone(), session_id.clone(), teardown_delay);
    }
}
