//! Error taxonomy for the session orchestrator.

use thiserror::Error;
use whorlproto::{ExpiryReason, FingerName, SessionId};

/// Everything that can terminate or reject a session operation.
///
/// The `Display` form doubles as the human-readable hint sent to
/// clients; internal diagnostics go to tracing fields only.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session is already active; the scanner is a single exclusive
    /// device. Non-fatal, the client retries later.
    #[error("an enrollment session is already in progress")]
    AlreadyActive,

    /// A command referenced a stale or unknown session id. Surfaced,
    /// no mutation.
    #[error("no active session with id {given}")]
    SessionMismatch { given: SessionId },

    /// The driver exhausted its own retries for one finger. A skipped
    /// finger is not an acceptable partial result, so this ends the
    /// whole session.
    #[error("could not capture {finger}: clean the scanner surface, press firmly and hold still, then start a new session")]
    CaptureFailure { finger: FingerName, detail: String },

    /// The watchdog timed the session out.
    #[error("session expired: {0}")]
    Expired(ExpiryReason),

    /// Unexpected failure inside the session task, caught at the task
    /// boundary so it never crashes the monitor or the gateway.
    #[error("an internal error ended the session; please start again")]
    Internal(String),
}

impl SessionError {
    /// Short hint suitable for the client-facing event payload.
    pub fn hint(&self) -> String {
        self.to_string()
    }

    /// Internal diagnostic detail, if this error carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            SessionError::CaptureFailure { detail, .. } => Some(detail),
            SessionError::Internal(detail) => Some(detail),
            _ => None,
        }
    }
}
