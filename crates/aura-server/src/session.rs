//! Per-connection protocol loop.
//!
//! A session owns nothing but its WebSocket. Every inbound frame is decoded
//! by [`handle_message`] and answered with exactly one text frame.

use std::net::SocketAddr;
use std::sync::Arc;

use aura_memory::KnowledgeStore;
use aura_types::{AuraError, ClientMessage, FeedbackEvent, MessageKind, Reply};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Message dispatch
// ---------------------------------------------------------------------------

/// Decode one inbound message, apply it to `store` and build the reply.
///
/// | `messageType` | Effect | Reply |
/// |---|---|---|
/// | `feedback` | [`KnowledgeStore::apply_feedback`] | [`Reply::Ack`] |
/// | `retrieve` | [`KnowledgeStore::snapshot`] | [`Reply::Scores`] |
/// | other / missing | none | [`Reply::Unknown`] |
///
/// Text that is not a JSON envelope, and feedback whose `behavior` is
/// missing or lacks an `action`, yield [`Reply::Error`]. A `feedback` value
/// other than `1`/`-1` is logged and ignored but still acknowledged.
pub fn handle_message(text: &str, store: &KnowledgeStore) -> Reply {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "undecodable message");
            return Reply::Error(format!("Error decoding message: {e}"));
        }
    };

    match message.kind {
        MessageKind::Feedback => handle_feedback(message.behavior, store),
        MessageKind::Retrieve => retrieve(store),
        MessageKind::Unknown => Reply::Unknown,
    }
}

fn handle_feedback(behavior: Option<Value>, store: &KnowledgeStore) -> Reply {
    let event = match decode_feedback(behavior) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "malformed feedback");
            return Reply::Error(format!("Error decoding feedback: {e}"));
        }
    };

    match event.sign() {
        Ok(sign) => {
            let score = store.apply_feedback(&event.action, sign);
            info!(
                subject = %event.id,
                action = %event.action,
                device = %event.device,
                score,
                "feedback applied"
            );
        }
        Err(e) => {
            warn!(
                subject = %event.id,
                action = %event.action,
                device = %event.device,
                error = %e,
                "feedback ignored"
            );
        }
    }
    Reply::Ack
}

fn decode_feedback(behavior: Option<Value>) -> Result<FeedbackEvent, AuraError> {
    let behavior = behavior.ok_or_else(|| AuraError::Decode("missing behavior".to_string()))?;
    serde_json::from_value(behavior).map_err(|e| AuraError::Decode(e.to_string()))
}

fn retrieve(store: &KnowledgeStore) -> Reply {
    match serde_json::to_string_pretty(&store.snapshot()) {
        Ok(json) => Reply::Scores(json),
        Err(e) => Reply::Error(format!("Error encoding knowledge: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

/// Serve one client until it closes the connection.
///
/// Text frames and UTF-8 binary frames are dispatched through
/// [`handle_message`]; control frames are left to tungstenite. After a client
/// `Close` the stream is polled until tungstenite has flushed the close reply
/// and ends it.
///
/// # Errors
///
/// Returns [`AuraError::Connection`] when reading from or writing to the
/// socket fails. The shared store is unaffected.
pub async fn run_session<S>(
    ws: WebSocketStream<S>,
    peer: SocketAddr,
    store: Arc<KnowledgeStore>,
) -> Result<(), AuraError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = ws.split();

    while let Some(frame) = ws_rx.next().await {
        let reply = match frame {
            Ok(Message::Text(text)) => handle_message(text.as_str(), &store),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => handle_message(text, &store),
                Err(e) => Reply::Error(format!("Error decoding message: {e}")),
            },
            Ok(_) => continue,
            Err(e) => {
                return Err(AuraError::Connection(format!("read from {peer}: {e}")));
            }
        };

        ws_tx
            .send(Message::Text(reply.into_text().into()))
            .await
            .map_err(|e| AuraError::Connection(format!("write to {peer}: {e}")))?;
    }

    debug!(peer = %peer, "session closed by client");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
