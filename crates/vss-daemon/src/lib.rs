// SPDX-License-Identifier: MIT OR Apache-2.0
//! The boundary transport: a WebSocket endpoint wiring each connection to
//! the Request Processor, plus a health check (§6, §9 ambient stack).
//!
//! This crate is intentionally thin: all broker semantics live in
//! `vss-broker` and the crates it depends on; this layer only moves bytes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value as JsonValue};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vss_broker::{BrokerContext, RequestProcessor, SessionState};
use vss_subscriptions::{Notification, Sink};

/// Shared daemon state handed to every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<RequestProcessor>,
}

impl AppState {
    pub fn new(ctx: Arc<BrokerContext>) -> Self {
        AppState {
            processor: Arc::new(RequestProcessor::new(ctx)),
        }
    }
}

/// Build the Axum router: a `/health` check and the `/ws` broker endpoint.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One frame queued for the writer task: either a direct reply to a
/// request, or a subscription push delivered out of band.
enum Outbound {
    Reply(JsonValue),
    Push(Notification),
}

fn render_push(notification: &Notification) -> JsonValue {
    json!({
        "action": "subscription",
        "subscriptionId": notification.subscription_id.to_string(),
        "ts": notification.datapoint.ts.to_iso8601(),
        "data": [{
            "path": notification.path.render(),
            "dp": {
                "value": serde_json::to_value(&notification.datapoint.value).unwrap_or(JsonValue::Null),
                "ts": notification.datapoint.ts.to_iso8601(),
            }
        }],
    })
}

/// Forwards published [`Notification`]s onto a connection's outbound
/// queue. Called from the publisher thread, so it must not block.
///
/// Returns `false` once the connection's writer task has exited (its
/// receiver dropped), letting the publisher loop tear down this session's
/// remaining subscriptions instead of queuing forever into the void.
struct ChannelSink(mpsc::UnboundedSender<Outbound>);

impl Sink for ChannelSink {
    fn notify(&self, notification: Notification) -> bool {
        self.0.send(Outbound::Push(notification)).is_ok()
    }
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let connection_id = format!("conn-{}", NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    let session = Arc::new(SessionState::new(connection_id.clone(), "websocket"));

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let sink: Arc<dyn Sink> = Arc::new(ChannelSink(tx.clone()));

    let writer_connection_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let payload = match outbound {
                Outbound::Reply(value) => value,
                Outbound::Push(notification) => render_push(&notification),
            };
            let Ok(text) = serde_json::to_string(&payload) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        debug!(connection = %writer_connection_id, "writer task exiting");
    });

    info!(connection = %connection_id, "websocket connection established");

    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let raw: JsonValue = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "rejecting malformed request");
                let err = vss_error::BrokerError::BadRequest(format!("malformed JSON: {e}"));
                let envelope = vss_protocol::ErrorResponse::new(
                    "unknown",
                    Some(JsonValue::String("UNKNOWN".to_string())),
                    &err,
                );
                if tx
                    .send(Outbound::Reply(
                        serde_json::to_value(envelope).expect("error envelope serializes"),
                    ))
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };
        let action = raw
            .get("action")
            .and_then(JsonValue::as_str)
            .unwrap_or("?")
            .to_string();
        let response = state.processor.handle(&session, &sink, &raw);
        debug!(connection = %connection_id, action = %action, "handled request");
        if tx.send(Outbound::Reply(response)).is_err() {
            break;
        }
    }

    state.processor.close_session(&session);
    drop(tx);
    let _ = writer.await;
    info!(connection = %connection_id, "websocket connection closed");
}
