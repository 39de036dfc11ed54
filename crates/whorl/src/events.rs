//! Event emission path.
//!
//! Everything the daemon tells a client flows through one sink so the
//! capture loop, watchdog, and gateway never know which transport is
//! bound, or whether one is bound at all.

use crate::registry::SessionRegistry;
use std::sync::Arc;
use whorlproto::ServerEvent;

/// Outbound event sink. Implementations must not block; emission from
/// the capture loop happens on the session task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ServerEvent);
}

/// The production sink: records the emission in the registry (for
/// reconnect replay and the fallback poller), then forwards it to the
/// bound connection if one exists. A session with no bound connection
/// drops events on the floor by design of the realtime channel; the
/// stored copy is what a reconnecting client replays.
pub struct RegistrySink {
    registry: Arc<SessionRegistry>,
}

impl RegistrySink {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

impl EventSink for RegistrySink {
    fn emit(&self, event: ServerEvent) {
        let Some(tx) = self.registry.store_emission(&event) else {
            tracing::debug!(event = ?event_kind(&event), "no bound connection, event stored only");
            return;
        };
        if tx.send(event).is_err() {
            // Receiver side already hung up; the disconnect handler
            // will unbind the connection shortly.
            tracing::debug!("event send raced a closing connection");
        }
    }
}

fn event_kind(event: &ServerEvent) -> &'static str {
    match event {
        ServerEvent::SessionStarted { .. } => "session_started",
        ServerEvent::ScannerStatus { .. } => "scanner_status",
        ServerEvent::PreviewFrame { .. } => "preview_frame",
        ServerEvent::SessionComplete { .. } => "session_complete",
        ServerEvent::SessionCancelled { .. } => "session_cancelled",
        ServerEvent::SessionExpired { .. } => "session_expired",
        ServerEvent::CommandError { .. } => "command_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use tokio::sync::mpsc;
    use whorlproto::{FingerName, ScanStatus};

    #[tokio::test]
    async fn test_emit_forwards_to_bound_connection() {
        let registry = SessionRegistry::new_shared();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry
            .create(
                ConnectionHandle::new(tx),
                "p1".to_string(),
                vec![FingerName::from("f1")],
            )
            .unwrap();

        let sink = RegistrySink::new(registry);
        sink.emit(ServerEvent::ScannerStatus {
            session_id: id,
            finger_name: FingerName::from("f1"),
            status: ScanStatus::Waiting,
            hint: None,
            metrics: None,
        });

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ServerEvent::ScannerStatus { .. }));
    }

    #[tokio::test]
    async fn test_emit_without_connection_still_stores() {
        let registry = SessionRegistry::new_shared();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = ConnectionHandle::new(tx);
        let conn_id = conn.id;
        let id = registry
            .create(conn, "p1".to_string(), vec![FingerName::from("f1")])
            .unwrap();
        registry.mark_disconnected(conn_id);

        let sink = RegistrySink::new(registry.clone());
        sink.emit(ServerEvent::ScannerStatus {
            session_id: id,
            finger_name: FingerName::from("f1"),
            status: ScanStatus::Capturing,
            hint: None,
            metrics: None,
        });

        assert_eq!(registry.snapshot().status, ScanStatus::Capturing);
    }
}
