//! Socket (WebSocket) adapter.
//!
//! # Responsibilities
//! - Authenticate once, at the upgrade handshake
//! - Authorize and dispatch every `{topic, data}` message
//! - Render outcomes as `{topic, data}` replies, including file frames
//!
//! # Data Flow
//! ```text
//! Client ── upgrade + Authorization ──→ identify ──✗──→ 401, no upgrade
//!                                          │
//!                                          ✓
//! Client ←──── {topic, data} replies ──── session loop ←──── {topic, data}
//! ```
//!
//! # Design Decisions
//! - Messages on one connection are handled in arrival order
//! - Cookies cannot cross the socket; reply headers travel as `_headers`
//! - Redirects degrade to a fixed text message
//! - Invalid frames are logged and skipped; the session survives

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::dispatch::{
    file, invoke, Environment, FileReply, HandlerFault, Outcome, ReplySpec, Transport, DENIED_MESSAGE,
    MOVED_MESSAGE, NOT_FOUND_MESSAGE,
};
use crate::http::response;
use crate::http::server::AppState;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::security::{Decision, Identity, Presented};

type Sink = SplitSink<WebSocket, Message>;

#[derive(Debug, Deserialize)]
struct Inbound {
    topic: String,
    #[serde(default)]
    data: Value,
}

/// Upgrade handler mounted at `websocket.path`.
pub async fn websocket_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let presented = Presented::from_headers(&headers);
    let identity = match state.authorizer.identify(&presented).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::info!("Socket handshake rejected: unauthenticated");
            metrics::record_auth_decision(Decision::Unauthenticated.as_str());
            return response::unauthenticated(&state.config.auth.realm);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Socket handshake rejected: provider failure");
            metrics::record_auth_decision(Decision::Unauthenticated.as_str());
            return response::unauthenticated(&state.config.auth.realm);
        }
    };

    ws.on_upgrade(move |socket| serve_socket(socket, state, identity))
}

async fn serve_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let guard = state.connections.track();
    let connection_id = guard.id();
    let mut draining = state.connections.drain_receiver();
    tracing::info!(connection_id = %connection_id, user = %identity.name, "Socket connected");

    let (mut sink, mut stream) = socket.split();
    if state.connections.is_draining() {
        let _ = sink.send(Message::Close(None)).await;
        return;
    }
    loop {
        tokio::select! {
            _ = draining.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_text(&state, &identity, connection_id, &mut sink, text.as_str()).await {
                        tracing::debug!(connection_id = %connection_id, error = %e, "Socket send failed");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Socket receive failed");
                    break;
                }
            }
        }
    }

    tracing::info!(connection_id = %connection_id, "Socket disconnected");
    drop(guard);
}

async fn handle_text(
    state: &AppState,
    identity: &Identity,
    connection_id: ConnectionId,
    sink: &mut Sink,
    text: &str,
) -> Result<(), axum::Error> {
    let inbound: Inbound = match serde_json::from_str(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "Invalid socket message");
            return Ok(());
        }
    };
    let start = Instant::now();
    let topic = inbound.topic;

    let Some(entry) = state.registry.match_topic(&topic) else {
        tracing::debug!(connection_id = %connection_id, topic = %topic, "No topic matched");
        metrics::record_dispatch(Transport::WebSocket.as_str(), "not_found", start);
        return send_reply(sink, &topic, json!(NOT_FOUND_MESSAGE)).await;
    };

    if state.authorizer.authorize(&entry.action_id, identity).await != Decision::Allowed {
        tracing::info!(
            connection_id = %connection_id,
            topic = %topic,
            user = %identity.name,
            "Socket message denied"
        );
        metrics::record_dispatch(Transport::WebSocket.as_str(), "denied", start);
        return send_reply(sink, &topic, json!(DENIED_MESSAGE)).await;
    }

    let mut env = Environment::new(Transport::WebSocket, entry.action_id.clone(), entry.topic.clone());
    env.method = Method::GET;
    env.data = inbound.data;
    env.identity = Some(identity.clone());
    env.request_id = uuid::Uuid::new_v4().to_string();

    tracing::debug!(
        connection_id = %connection_id,
        request_id = %env.request_id,
        topic = %topic,
        "Dispatching socket message"
    );

    let result = match invoke(&entry.handler, env).await {
        Ok(outcome) => {
            let kind = outcome.kind();
            send_outcome(sink, &topic, outcome, state.config.websocket.frame_chunk_size).await?;
            kind
        }
        Err(fault) => {
            send_reply(sink, &topic, json!(fault.to_string())).await?;
            "fault"
        }
    };
    metrics::record_dispatch(Transport::WebSocket.as_str(), result, start);
    Ok(())
}

/// Render an outcome as socket frames on `topic`.
async fn send_outcome(
    sink: &mut Sink,
    topic: &str,
    outcome: Outcome,
    chunk_size: usize,
) -> Result<(), axum::Error> {
    match outcome {
        Outcome::Reply(spec) => send_reply(sink, topic, reply_data(spec)).await,
        Outcome::Redirect { .. } => send_reply(sink, topic, json!(MOVED_MESSAGE)).await,
        Outcome::File(file) => send_file(sink, topic, file, chunk_size).await,
        // forward_to refuses the socket transport, so this only happens when
        // a handler builds the outcome by hand.
        Outcome::Forwarded(response) => {
            tracing::warn!(topic = %topic, status = %response.status(), "Dropping forwarded response on socket");
            let fault = HandlerFault {
                topic: topic.to_string(),
            };
            send_reply(sink, topic, json!(fault.to_string())).await
        }
    }
}

/// Socket form of a reply: headers ride along as `_headers`, cookies are dropped.
pub(crate) fn reply_data(spec: ReplySpec) -> Value {
    if spec.headers.is_empty() {
        return spec.data;
    }
    let headers: Map<String, Value> = spec
        .headers
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    json!({ "data": spec.data, "_headers": headers })
}

async fn send_file(
    sink: &mut Sink,
    topic: &str,
    reply: FileReply,
    chunk_size: usize,
) -> Result<(), axum::Error> {
    send_reply(
        sink,
        topic,
        json!({
            "start": true,
            "contentType": reply.content_type,
            "filename": reply.filename,
        }),
    )
    .await?;

    let mut frames = file::rechunk(reply.stream, chunk_size);
    while let Some(chunk) = frames.next().await {
        match chunk {
            Ok(bytes) => send_reply(sink, topic, json!({ "data": bytes.to_vec() })).await?,
            Err(e) => {
                // A failed stream ends with the fault text, never an end frame.
                tracing::error!(topic = %topic, error = %e, "File stream failed");
                metrics::record_handler_fault(topic);
                let fault = HandlerFault {
                    topic: topic.to_string(),
                };
                return send_reply(sink, topic, json!(fault.to_string())).await;
            }
        }
    }

    send_reply(sink, topic, json!({ "end": true })).await
}

async fn send_reply(sink: &mut Sink, topic: &str, data: Value) -> Result<(), axum::Error> {
    let frame = json!({ "topic": topic, "data": data }).to_string();
    sink.send(Message::Text(frame.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_without_headers_is_bare() {
        let spec = ReplySpec::new(json!(["alpha"]));
        assert_eq!(reply_data(spec), json!(["alpha"]));
    }

    #[test]
    fn test_reply_headers_travel_as_underscore_headers() {
        let spec = ReplySpec::new(json!(["alpha", "bravo"]))
            .header("test-header", "look a header value!")
            .cookie("dropped", crate::dispatch::CookieSpec::new("x"));
        assert_eq!(
            reply_data(spec),
            json!({
                "data": ["alpha", "bravo"],
                "_headers": {"test-header": "look a header value!"}
            })
        );
    }
}
