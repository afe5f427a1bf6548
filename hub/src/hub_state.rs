use crate::cursor_registry::CursorRegistry;
use protocol::{
    ClientId, ClientMessage, CursorPosition, IdentityGenerator, ProtocolError, RandomIdentity,
    ServerMessage,
};

/// The shared document and cursor registry.
///
/// Only the hub task owns one of these, so every method runs to completion
/// before the next message is looked at.
pub struct HubState {
    document: String,
    cursors: CursorRegistry,
    identity: Box<dyn IdentityGenerator>,
}

impl HubState {
    pub fn new() -> Self {
        Self::with_identity(Box::new(RandomIdentity))
    }

    pub fn with_identity(identity: Box<dyn IdentityGenerator>) -> Self {
        Self {
            document: String::new(),
            cursors: CursorRegistry::new(),
            identity,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn cursors(&self) -> &CursorRegistry {
        &self.cursors
    }

    /// Registers a new connection and returns its id with the `init` to send it.
    pub fn connect(&mut self) -> (ClientId, ServerMessage) {
        let client_id = self.identity.client_id();
        let color = self.identity.color();
        self.cursors.insert_default(client_id.clone(), color);
        log::info!(
            "Connection {} registered ({} cursors)",
            client_id,
            self.cursors.len()
        );
        let init = ServerMessage::Init {
            data: self.document.clone(),
            cursors: self.cursors.snapshot(),
            client_id: Some(client_id.clone()),
        };
        (client_id, init)
    }

    /// Applies a raw client frame. `Ok(Some(..))` must be broadcast to every connection.
    pub fn handle_message(&mut self, raw: &str) -> Result<Option<ServerMessage>, ProtocolError> {
        match ClientMessage::parse(raw)? {
            ClientMessage::Update { data } => Ok(Some(self.apply_update(data))),
            ClientMessage::Cursor {
                client_id,
                position,
            } => Ok(Some(self.move_cursor(client_id, position))),
            ClientMessage::Unknown => {
                log::debug!("Ignoring message of unknown type");
                Ok(None)
            }
        }
    }

    pub fn apply_update(&mut self, data: String) -> ServerMessage {
        self.document = data;
        ServerMessage::Update {
            data: self.document.clone(),
        }
    }

    pub fn move_cursor(&mut self, client_id: ClientId, position: CursorPosition) -> ServerMessage {
        let identity = &mut self.identity;
        self.cursors
            .upsert(client_id, position, || identity.color());
        self.cursor_broadcast()
    }

    /// Drops the connection's cursor. The document is not resent.
    pub fn disconnect(&mut self, client_id: &str) -> ServerMessage {
        if self.cursors.remove(client_id).is_none() {
            log::debug!("Connection {} had no cursor", client_id);
        }
        log::info!(
            "Connection {} left ({} cursors)",
            client_id,
            self.cursors.len()
        );
        self.cursor_broadcast()
    }

    fn cursor_broadcast(&self) -> ServerMessage {
        ServerMessage::Cursor {
            cursors: self.cursors.snapshot(),
        }
    }
}

impl std::default::Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}
