//! Web endpoints for whorl.
//!
//! The realtime enrollment channel rides a WebSocket; a small set of
//! plain HTTP routes covers discovery, health, and the fallback status
//! poll for clients whose socket is down.

use crate::gateway::Gateway;
use crate::registry::ConnectionHandle;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use whorlproto::{ClientCommand, ServerEvent};

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub gateway: Arc<Gateway>,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/ws", get(enroll_ws))
        .with_state(state)
}

/// Serve root discovery endpoint
async fn serve_root() -> impl IntoResponse {
    let links = serde_json::json!({
        "name": "whorl",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "health": "/healthz",
            "status": "/status",
            "channel": "/ws",
        }
    });
    Json(links)
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Fallback poll: a read-only snapshot of the active session's last
/// reported progress. Returns the idle shape when no session exists.
async fn status(State(state): State<WebState>) -> impl IntoResponse {
    Json(state.gateway.registry().snapshot())
}

/// WebSocket handler for the enrollment channel
async fn enroll_ws(State(state): State<WebState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_channel(socket, state.gateway))
}

/// Pump one channel connection: a writer task drains the outbound
/// queue while this task parses inbound frames into commands. JSON
/// framing stays here; the gateway never sees a socket.
async fn handle_channel(socket: WebSocket, gateway: Arc<Gateway>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let connection = ConnectionHandle::new(tx);
    let conn_id = connection.id;
    tracing::debug!(conn_id = %conn_id, "channel connection opened");

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(error = %err, "event serialization failed");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    gateway.on_connect(connection.clone());

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => gateway.handle_command(&connection, command),
                Err(err) => gateway.handle_bad_frame(&connection, &err.to_string()),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::debug!(conn_id = %conn_id, "channel connection closed");
    writer.abort();
    gateway.on_disconnect(conn_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NullDriver;
    use crate::events::RegistrySink;
    use crate::registry::{SessionRegistry, SessionTiming};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn test_router() -> Router {
        let registry = SessionRegistry::new_shared();
        let sink = Arc::new(RegistrySink::new(registry.clone()));
        let gateway = Arc::new(Gateway::new(
            registry,
            Arc::new(NullDriver),
            sink,
            SessionTiming::default(),
        ));
        router(WebState { gateway })
    }

    #[tokio::test]
    async fn test_healthz_ok() {
        let response = test_router()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_idle_shape() {
        let response = test_router()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["session_id"].is_null());
        assert_eq!(json["status"], "waiting");
        assert!(json["last_preview"].is_null());
    }

    #[tokio::test]
    async fn test_root_discovery_links() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "whorl");
        assert_eq!(json["links"]["channel"], "/ws");
    }
}
