//! Core identifiers and status vocabulary shared by commands, events
//! and the fallback snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an enrollment session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a new unique session ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a finger in the capture queue (e.g. "left_index").
///
/// Opaque to the orchestrator; the client and the downstream scoring
/// service agree on the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerName(pub String);

impl FingerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FingerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FingerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-step scanner status shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// No capture in flight; waiting for the next command or finger.
    Waiting,
    /// Scanner is watching for a finger on the platen.
    Detecting,
    /// A finger is present and an image is being acquired.
    Capturing,
    /// The current finger was captured successfully.
    Success,
    /// The capture step failed.
    Error,
    /// The session was cancelled mid-step.
    Cancelled,
}

/// Why a session was expired by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryReason {
    /// Absolute session lifetime exceeded, regardless of activity.
    MaxLifetimeReached,
    /// No client activity within the inactivity window.
    InactivityTimeout,
}

impl std::fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryReason::MaxLifetimeReached => write!(f, "maximum session lifetime reached"),
            ExpiryReason::InactivityTimeout => write!(f, "session inactive for too long"),
        }
    }
}

/// Quality metrics reported by the capture hardware for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetrics {
    /// Vendor quality score for the capture.
    pub score: u32,
    /// Raw quality warning flags from the device.
    pub quality_flags: u32,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

/// Point-in-time view of the active session for clients without a
/// live channel. Never contains captured artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Active session id, or None when the scanner is idle.
    pub session_id: Option<SessionId>,
    /// Finger currently being captured.
    pub finger_name: Option<FingerName>,
    /// Most recent scanner status.
    pub status: ScanStatus,
    /// Human-readable hint accompanying the status.
    pub hint: Option<String>,
    /// Metrics from the most recent capture step.
    pub metrics: Option<CaptureMetrics>,
    /// Most recent preview frame, base64-encoded. Ephemeral.
    pub last_preview: Option<String>,
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of an idle scanner (no active session).
    pub fn idle() -> Self {
        Self {
            session_id: None,
            finger_name: None,
            status: ScanStatus::Waiting,
            hint: None,
            metrics: None,
            last_preview: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_id_generation_is_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_scan_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ScanStatus::Detecting).unwrap(),
            "\"detecting\""
        );
        assert_eq!(
            serde_json::to_string(&ScanStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn test_expiry_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&ExpiryReason::MaxLifetimeReached).unwrap(),
            "\"MAX_LIFETIME_REACHED\""
        );
        assert_eq!(
            serde_json::to_string(&ExpiryReason::InactivityTimeout).unwrap(),
            "\"INACTIVITY_TIMEOUT\""
        );
    }

    #[test]
    fn test_idle_snapshot() {
        let snapshot = StatusSnapshot::idle();
        assert!(snapshot.session_id.is_none());
        assert_eq!(snapshot.status, ScanStatus::Waiting);
        assert!(snapshot.last_preview.is_none());
    }
}
