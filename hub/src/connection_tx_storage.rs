use crate::connection::ConnectionEvent;
use protocol::{ClientId, ServerMessage};
use std::collections::HashMap;

pub type ConnectionTx = tokio::sync::mpsc::UnboundedSender<ConnectionEvent>;

pub struct ConnectionTxStorage {
    connection_txs: HashMap<ClientId, ConnectionTx>,
}

impl ConnectionTxStorage {
    pub fn new() -> Self {
        Self {
            connection_txs: HashMap::new(),
        }
    }

    /// A colliding id replaces the older connection's sender.
    pub fn insert(&mut self, client_id: ClientId, tx: ConnectionTx) {
        if self.connection_txs.insert(client_id.clone(), tx).is_some() {
            log::warn!("Connection id {} collided, replacing older sender", client_id);
        }
    }

    pub fn remove(&mut self, client_id: &str) -> Option<ConnectionTx> {
        self.connection_txs.remove(client_id)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }

    pub fn send(&self, to: &str, event: ConnectionEvent) {
        if let Some(tx) = self.connection_txs.get(to) {
            if tx.send(event).is_err() {
                log::debug!("Connection {} is already closed", to);
            }
        } else {
            log::warn!("No connection {}", to);
        }
    }

    pub fn send_message(&self, to: &str, message: &ServerMessage) {
        match message.encode() {
            Ok(text) => self.send(to, ConnectionEvent::Frame(text)),
            Err(e) => log::error!("{}", e),
        }
    }

    /// Sends to every registered connection, the originator included.
    pub fn broadcast(&self, message: &ServerMessage) {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        };
        for (client_id, tx) in &self.connection_txs {
            if tx.send(ConnectionEvent::Frame(text.clone())).is_err() {
                log::debug!("Skipping closed connection {}", client_id);
            }
        }
    }
}
