//! Per-socket task: frame parsing, the writer channel and the session handoff.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{InboundMessage, OutboundMessage},
    error::CommandError,
    state::{SharedState, connections::encode, game::ConnectionId, session::SessionCommand},
};

/// Handle the full lifecycle of one player or spectator WebSocket.
///
/// Frames are parsed and validated here; only well-formed commands reach the session.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = ConnectionId::new();
    state.connections().insert(connection, outbound_tx.clone());
    if let Err(err) = state.dispatch(SessionCommand::Connected(connection)) {
        warn!(%connection, error = %err, "refusing connection");
        state.connections().remove(connection);
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(%connection, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(%connection, payload = %text.as_str(), "received frame");
                match InboundMessage::from_json_str(&text) {
                    Ok(message) => {
                        let command = SessionCommand::Inbound {
                            connection,
                            message,
                        };
                        if let Err(err) = state.dispatch(command) {
                            warn!(%connection, error = %err, "session stopped; closing socket");
                            let _ = outbound_tx.send(Message::Close(None));
                            break;
                        }
                    }
                    Err(err) => reject_command(&outbound_tx, connection, &err),
                }
            }
            Ok(Message::Binary(_)) => {
                reject_command(&outbound_tx, connection, &CommandError::UnsupportedFrame)
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                info!(%connection, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Err(err) => {
                warn!(%connection, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(connection);
    if state
        .dispatch(SessionCommand::Disconnected(connection))
        .is_err()
    {
        debug!(%connection, "session already stopped");
    }
    info!(%connection, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Answer a refused frame with `commandRejected` on the sender's socket only.
fn reject_command(
    tx: &mpsc::UnboundedSender<Message>,
    connection: ConnectionId,
    err: &CommandError,
) {
    warn!(%connection, error = %err, "rejecting command");
    let reply = OutboundMessage::CommandRejected {
        message: err.to_string(),
    };
    if let Some(frame) = encode(&reply) {
        let _ = tx.send(frame);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(raw: &str) -> serde_json::Value {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = InboundMessage::from_json_str(raw).unwrap_err();
        reject_command(&tx, ConnectionId::new(), &err);
        match rx.try_recv() {
            Ok(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_rejected_with_reason() {
        let reply = rejected(r#"{"type":"teleport"}"#);
        assert_eq!(reply["type"], "commandRejected");
        assert!(
            reply["message"]
                .as_str()
                .unwrap()
                .starts_with("malformed command")
        );
    }

    #[test]
    fn out_of_range_payload_is_rejected_as_invalid() {
        let reply = rejected(r#"{"type":"gainPoints","playerId":7,"score":10}"#);
        assert_eq!(reply["type"], "commandRejected");
        assert!(
            reply["message"]
                .as_str()
                .unwrap()
                .starts_with("validation failed")
        );
    }
}
