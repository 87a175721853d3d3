//! Writer channels of open sockets; the production outbox.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    dto::ws::OutboundMessage,
    state::{game::ConnectionId, ports::Outbox},
};

/// Writer channels of every open WebSocket, keyed by connection.
///
/// This is the production [`Outbox`]: each frame is serialized once and pushed onto the
/// writer channel of every addressed socket. Channels whose writer task is gone are pruned.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

impl ConnectionRegistry {
    /// Register the writer channel of a new socket.
    pub fn insert(&self, connection: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.connections.insert(connection, tx);
    }

    /// Forget a socket; `true` if it was registered.
    pub fn remove(&self, connection: ConnectionId) -> bool {
        self.connections.remove(&connection).is_some()
    }

    /// Open sockets.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no socket is open.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn deliver(&self, message: &OutboundMessage, addressed: impl Fn(ConnectionId) -> bool) {
        let Some(frame) = encode(message) else {
            return;
        };

        let closed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| addressed(*entry.key()))
            .filter(|entry| entry.value().send(frame.clone()).is_err())
            .map(|entry| *entry.key())
            .collect();

        for connection in closed {
            debug!(%connection, "dropping connection with closed writer");
            self.connections.remove(&connection);
        }
    }
}

impl Outbox for ConnectionRegistry {
    fn broadcast(&self, message: &OutboundMessage) {
        self.deliver(message, |_| true);
    }

    fn broadcast_except(&self, excluded: ConnectionId, message: &OutboundMessage) {
        self.deliver(message, |connection| connection != excluded);
    }

    fn send_to(&self, connection: ConnectionId, message: &OutboundMessage) {
        self.deliver(message, |candidate| candidate == connection);
    }
}

/// Serialize an outbound message into a text frame.
pub fn encode(message: &OutboundMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<String> {
        match rx.try_recv() {
            Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
            _ => None,
        }
    }

    fn connect(registry: &ConnectionRegistry) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new();
        registry.insert(connection, tx);
        (connection, rx)
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let registry = ConnectionRegistry::default();
        let (_, mut a) = connect(&registry);
        let (_, mut b) = connect(&registry);

        registry.broadcast(&OutboundMessage::ToSceneGameArena);

        let expected = r#"{"type":"toSceneGameArena"}"#;
        assert_eq!(text(&mut a).as_deref(), Some(expected));
        assert_eq!(text(&mut b).as_deref(), Some(expected));
    }

    #[test]
    fn broadcast_except_skips_the_sender() {
        let registry = ConnectionRegistry::default();
        let (sender, mut a) = connect(&registry);
        let (_, mut b) = connect(&registry);

        registry.broadcast_except(sender, &OutboundMessage::HideVotingSequence);

        assert_eq!(text(&mut a), None);
        assert!(text(&mut b).is_some());
    }

    #[test]
    fn send_to_targets_a_single_socket() {
        let registry = ConnectionRegistry::default();
        let (target, mut a) = connect(&registry);
        let (_, mut b) = connect(&registry);

        registry.send_to(target, &OutboundMessage::UpdateFallRate { level: 3 });

        assert_eq!(
            text(&mut a).as_deref(),
            Some(r#"{"type":"updateFallRate","level":3}"#)
        );
        assert_eq!(text(&mut b), None);
    }

    #[test]
    fn closed_writers_are_pruned() {
        let registry = ConnectionRegistry::default();
        let (_, rx) = connect(&registry);
        let (_, mut alive) = connect(&registry);
        drop(rx);

        registry.broadcast(&OutboundMessage::ToSceneWaitingRoom);

        assert_eq!(registry.len(), 1);
        assert!(text(&mut alive).is_some());
    }
}
