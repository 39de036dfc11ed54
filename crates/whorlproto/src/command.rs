//! Inbound commands on the enrollment channel.

use crate::types::{FingerName, SessionId};
use serde::{Deserialize, Serialize};

/// Commands a client may send over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Begin an enrollment session for a participant.
    Start {
        /// Ordered queue of fingers to capture, fixed for the session.
        finger_names: Vec<FingerName>,
        /// Opaque correlation id for the participant.
        participant_id: String,
    },
    /// Cancel the named session.
    Cancel { session_id: SessionId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_start_command_wire_format() {
        let json = r#"{"type":"start","finger_names":["left_index","left_thumb"],"participant_id":"p-42"}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ClientCommand::Start {
                finger_names,
                participant_id,
            } => {
                assert_eq!(finger_names.len(), 2);
                assert_eq!(finger_names[0], FingerName::from("left_index"));
                assert_eq!(participant_id, "p-42");
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_command_wire_format() {
        let json = r#"{"type":"cancel","session_id":"abc-123"}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Cancel {
                session_id: SessionId::new("abc-123")
            }
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let json = r#"{"type":"reboot"}"#;
        assert!(serde_json::from_str::<ClientCommand>(json).is_err());
    }
}
