//! Outbound events on the enrollment channel.

use crate::types::{CaptureMetrics, ExpiryReason, FingerName, ScanStatus, SessionId};
use serde::{Deserialize, Serialize};

/// Machine-readable code for a rejected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandErrorCode {
    /// A session is already in progress; retry after it ends.
    AlreadyActive,
    /// The command referenced a stale or unknown session id.
    SessionMismatch,
    /// The command could not be parsed.
    BadCommand,
}

/// Events the server emits over the realtime channel.
///
/// Every terminal or error event carries a short human-readable hint;
/// internal diagnostics stay in the logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges a successful `start`.
    SessionStarted {
        session_id: SessionId,
        finger_queue: Vec<FingerName>,
        total: usize,
        current_index: usize,
    },
    /// Progress of the current capture step.
    ScannerStatus {
        session_id: SessionId,
        finger_name: FingerName,
        status: ScanStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        metrics: Option<CaptureMetrics>,
    },
    /// Live preview frame, base64-encoded. Ephemeral, never persisted.
    PreviewFrame {
        session_id: SessionId,
        frame_data: String,
    },
    /// All queued fingers were captured.
    SessionComplete {
        session_id: SessionId,
        total_captured: usize,
        finger_names: Vec<FingerName>,
    },
    /// The session was cancelled.
    SessionCancelled {
        session_id: SessionId,
        reason: String,
    },
    /// The watchdog expired the session.
    SessionExpired {
        session_id: SessionId,
        reason: ExpiryReason,
    },
    /// A command was rejected without mutating any session.
    CommandError {
        code: CommandErrorCode,
        hint: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
}

impl ServerEvent {
    /// The session this event belongs to, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ServerEvent::SessionStarted { session_id, .. }
            | ServerEvent::ScannerStatus { session_id, .. }
            | ServerEvent::PreviewFrame { session_id, .. }
            | ServerEvent::SessionComplete { session_id, .. }
            | ServerEvent::SessionCancelled { session_id, .. }
            | ServerEvent::SessionExpired { session_id, .. } => Some(session_id),
            ServerEvent::CommandError { session_id, .. } => session_id.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_expired_wire_format() {
        let event = ServerEvent::SessionExpired {
            session_id: SessionId::new("s1"),
            reason: ExpiryReason::InactivityTimeout,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_expired");
        assert_eq!(json["reason"], "INACTIVITY_TIMEOUT");
    }

    #[test]
    fn test_scanner_status_omits_empty_fields() {
        let event = ServerEvent::ScannerStatus {
            session_id: SessionId::new("s1"),
            finger_name: FingerName::from("left_index"),
            status: ScanStatus::Detecting,
            hint: None,
            metrics: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scanner_status");
        assert_eq!(json["status"], "detecting");
        assert!(json.get("hint").is_none());
        assert!(json.get("metrics").is_none());
    }

    #[test]
    fn test_session_complete_lists_fingers_in_order() {
        let fingers: Vec<FingerName> =
            ["f1", "f2", "f3"].iter().map(|f| FingerName::from(*f)).collect();
        let event = ServerEvent::SessionComplete {
            session_id: SessionId::new("s1"),
            total_captured: 3,
            finger_names: fingers.clone(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["total_captured"], 3);
        assert_eq!(json["finger_names"][0], "f1");
        assert_eq!(json["finger_names"][2], "f3");
    }

    #[test]
    fn test_command_error_round_trip() {
        let event = ServerEvent::CommandError {
            code: CommandErrorCode::SessionMismatch,
            hint: "no session with that id".to_string(),
            session_id: Some(SessionId::new("stale")),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_session_id_accessor() {
        let event = ServerEvent::PreviewFrame {
            session_id: SessionId::new("s1"),
            frame_data: "AAAA".to_string(),
        };
        assert_eq!(event.session_id(), Some(&SessionId::new("s1")));
    }
}
