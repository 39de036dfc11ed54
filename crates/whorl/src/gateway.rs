//! Channel gateway: transport-independent command handling.
//!
//! The web layer owns sockets and JSON framing; everything with
//! session meaning lives here. One gateway instance serves all
//! connections for the life of the process.

use crate::driver::CaptureDriver;
use crate::error::SessionError;
use crate::events::EventSink;
use crate::grace::spawn_grace_timer;
use crate::registry::{
    schedule_destroy, ConnectionHandle, SessionRegistry, SessionState, SessionTiming,
};
use crate::runner::spawn_session;
use crate::watchdog::spawn_watchdog;
use std::sync::Arc;
use uuid::Uuid;
use whorlproto::{ClientCommand, CommandErrorCode, ServerEvent};

pub struct Gateway {
    registry: Arc<SessionRegistry>,
    driver: Arc<dyn CaptureDriver>,
    sink: Arc<dyn EventSink>,
    timing: SessionTiming,
}

impl Gateway {
    pub fn new(
        registry: Arc<SessionRegistry>,
        driver: Arc<dyn CaptureDriver>,
        sink: Arc<dyn EventSink>,
        timing: SessionTiming,
    ) -> Self {
        Self {
            registry,
            driver,
            sink,
            timing,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// A connection came up. If a session is live, bind it and replay
    /// the latest progress so the client resumes mid-capture instead
    /// of restarting.
    pub fn on_connect(&self, connection: ConnectionHandle) {
        let tx = connection.tx.clone();
        if let Some((_, replay)) = self.registry.rebind(connection) {
            for event in replay {
                let _ = tx.send(event);
            }
        }
    }

    /// The bound connection went away. Arm the grace timer; a rebind
    /// before it fires keeps the session alive.
    pub fn on_disconnect(&self, conn_id: Uuid) {
        if let Some((session_id, epoch)) = self.registry.mark_disconnected(conn_id) {
            spawn_grace_timer(
                self.registry.clone(),
                session_id,
                epoch,
                self.timing.grace_period,
                self.timing.teardown_delay,
            );
        }
    }

    /// Dispatch one inbound command from a connection.
    pub fn handle_command(&self, connection: &ConnectionHandle, command: ClientCommand) {
        // Any inbound traffic counts as operator activity.
        if let Some(id) = self.registry.current_session_id() {
            self.registry.touch_activity(&id);
        }

        match command {
            ClientCommand::Start {
                finger_names,
                participant_id,
            } => {
                if finger_names.is_empty() {
                    self.reject(
                        connection,
                        CommandErrorCode::BadCommand,
                        "start requires at least one finger".to_string(),
                        None,
                    );
                    return;
                }
                match self
                    .registry
                    .create(connection.clone(), participant_id, finger_names.clone())
                {
                    Ok(session_id) => {
                        self.sink.emit(ServerEvent::SessionStarted {
                            session_id: session_id.clone(),
                            finger_queue: finger_names.clone(),
                            total: finger_names.len(),
                            current_index: 0,
                        });
                        spawn_watchdog(
                            self.registry.clone(),
                            self.sink.clone(),
                            session_id.clone(),
                            self.timing,
                        );
                        spawn_session(
                            self.registry.clone(),
                            self.driver.clone(),
                            self.sink.clone(),
                            session_id,
                            self.timing.teardown_delay,
                        );
                    }
                    Err(err @ SessionError::AlreadyActive) => {
                        self.reject(
                            connection,
                            CommandErrorCode::AlreadyActive,
                            err.hint(),
                            self.registry.current_session_id(),
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "session create failed");
                        self.reject(connection, CommandErrorCode::BadCommand, err.hint(), None);
                    }
                }
            }
            ClientCommand::Cancel { session_id } => match self.registry.request_cancel(&session_id)
            {
                Ok(()) => {
                    tracing::info!(session_id = %session_id, "session cancelled by operator");
                    if self.registry.set_state(&session_id, SessionState::Cancelled) {
                        self.sink.emit(ServerEvent::SessionCancelled {
                            session_id: session_id.clone(),
                            reason: "cancelled by operator".to_string(),
                        });
                        schedule_destroy(
                            self.registry.clone(),
                            session_id,
                            self.timing.teardown_delay,
                        );
                    }
                }
                Err(err) => {
                    self.reject(
                        connection,
                        CommandErrorCode::SessionMismatch,
                        err.hint(),
                        Some(session_id),
                    );
                }
            },
        }
    }

    /// A frame that did not parse as any command.
    pub fn handle_bad_frame(&self, connection: &ConnectionHandle, detail: &str) {
        tracing::warn!(detail, "unparseable command frame");
        self.reject(
            connection,
            CommandErrorCode::BadCommand,
            "command not understood".to_string(),
            None,
        );
    }

    /// Rejections go straight to the offending connection, never
    /// through the session-routed sink: the command may not belong to
    /// any session, or to somebody else's.
    fn reject(
        &self,
        connection: &ConnectionHandle,
        code: CommandErrorCode,
        hint: String,
        session_id: Option<whorlproto::SessionId>,
    ) {
        let _ = connection.tx.send(ServerEvent::CommandError {
            code,
            hint,
            session_id,
        });
    }
}
