use super::types::ConnectionId;
use crate::protocol::ServerMessage;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Fan-out over per-connection outboxes. Each message is encoded once per call.
#[derive(Debug, Default)]
pub struct Dispatcher {
    outboxes: HashMap<ConnectionId, UnboundedSender<String>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, connection: ConnectionId, sender: UnboundedSender<String>) {
        self.outboxes.insert(connection, sender);
    }

    pub fn detach(&mut self, connection: ConnectionId) {
        self.outboxes.remove(&connection);
    }

    pub fn to_one(&self, connection: ConnectionId, message: &ServerMessage) {
        let Some(sender) = self.outboxes.get(&connection) else {
            tracing::debug!(connection = %connection, "dropping message for unknown connection");
            return;
        };
        let Some(payload) = message.to_json() else { return };
        Self::deliver(connection, sender, payload);
    }

    pub fn to_all_except(&self, excluded: ConnectionId, message: &ServerMessage) {
        self.fan_out(Some(excluded), message);
    }

    pub fn to_all(&self, message: &ServerMessage) {
        self.fan_out(None, message);
    }

    fn fan_out(&self, excluded: Option<ConnectionId>, message: &ServerMessage) {
        if self.outboxes.is_empty() {
            return;
        }
        let Some(payload) = message.to_json() else { return };
        for (connection, sender) in &self.outboxes {
            if Some(*connection) == excluded {
                continue;
            }
            Self::deliver(*connection, sender, payload.clone());
        }
    }

    fn deliver(connection: ConnectionId, sender: &UnboundedSender<String>, payload: String) {
        if sender.send(payload).is_err() {
            tracing::debug!(connection = %connection, "outbox closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn attach(dispatcher: &mut Dispatcher) -> (ConnectionId, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ConnectionId::new();
        dispatcher.attach(connection, tx);
        (connection, rx)
    }

    fn empty_snapshot() -> ServerMessage {
        ServerMessage::PlayersSnapshot {
            players: Vec::new(),
        }
    }

    #[test]
    fn to_all_except_skips_the_sender() {
        let mut dispatcher = Dispatcher::new();
        let (a, mut rx_a) = attach(&mut dispatcher);
        let (_b, mut rx_b) = attach(&mut dispatcher);
        let (_c, mut rx_c) = attach(&mut dispatcher);

        dispatcher.to_all_except(a, &empty_snapshot());
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }

    #[test]
    fn to_one_and_to_all_reach_expected_receivers() {
        let mut dispatcher = Dispatcher::new();
        let (a, mut rx_a) = attach(&mut dispatcher);
        let (_b, mut rx_b) = attach(&mut dispatcher);

        dispatcher.to_one(a, &empty_snapshot());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());

        dispatcher.to_all(&empty_snapshot());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn sends_to_dead_or_detached_handles_are_no_ops() {
        let mut dispatcher = Dispatcher::new();
        let (a, rx_a) = attach(&mut dispatcher);
        let (b, mut rx_b) = attach(&mut dispatcher);
        drop(rx_a);

        dispatcher.to_one(a, &empty_snapshot());
        dispatcher.to_all(&empty_snapshot());
        assert!(rx_b.try_recv().is_ok());

        dispatcher.detach(b);
        dispatcher.to_one(b, &empty_snapshot());
        assert!(rx_b.try_recv().is_err());
    }
}
