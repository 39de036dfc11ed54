//! Capture driver seam.
//!
//! The hardware capture algorithm is an external collaborator (vendor
//! SDK). The orchestrator only depends on this narrow interface: one
//! capture step per call, cooperatively cancellable, with progress
//! reported through an injected sink.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use whorlproto::{CaptureMetrics, FingerName, ScanStatus};

/// Opaque capture result for one finger: raw image plus the quality
/// metrics the device reported. Cleared wholesale on teardown.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub image: Vec<u8>,
    pub metrics: CaptureMetrics,
}

/// Progress updates a driver may emit while a step is in flight.
#[derive(Debug, Clone)]
pub enum CaptureProgress {
    /// Scanner state change (detecting, capturing, ...).
    Status {
        status: ScanStatus,
        hint: Option<String>,
        metrics: Option<CaptureMetrics>,
    },
    /// Raw preview frame. Ephemeral, never persisted.
    Preview { frame: Vec<u8> },
}

/// Narrow event sink injected into the capture loop, decoupling it
/// from any specific transport.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, update: CaptureProgress);
}

/// Terminal result of one capture step.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The finger was captured; the artifact is ready to commit.
    Captured(Artifact),
    /// The driver observed the cancel signal at a safe point.
    Cancelled,
}

/// Driver-level failures. Per-attempt retry is the driver's own
/// concern; an error here means the step is unrecoverable and the
/// whole session ends.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture failed: {0}")]
    Failed(String),

    #[error("scanner device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// One capture step per call. Implementations must observe `cancel`
/// at safe points only; the orchestrator never force-kills an
/// in-flight hardware read.
#[async_trait]
pub trait CaptureDriver: Send + Sync {
    async fn capture_finger(
        &self,
        finger: &FingerName,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<CaptureOutcome, CaptureError>;
}

/// Driver used when no scanner integration is wired in. Every step
/// fails with a device-unavailable hint so the daemon stays useful
/// for channel-level testing.
pub struct NullDriver;

#[async_trait]
impl CaptureDriver for NullDriver {
    async fn capture_finger(
        &self,
        finger: &FingerName,
        _cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<CaptureOutcome, CaptureError> {
        progress.progress(CaptureProgress::Status {
            status: ScanStatus::Detecting,
            hint: None,
            metrics: None,
        });
        tracing::warn!(finger = %finger, "capture requested but no scanner driver is attached");
        Err(CaptureError::DeviceUnavailable(
            "no scanner attached".to_string(),
        ))
    }
}
