use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use protocol::ClientId;

use super::connection::ConnectionEvent;
use crate::connection_tx_storage::{ConnectionTx, ConnectionTxStorage};
use crate::hub_state::HubState;

pub type HubTx = UnboundedSender<HubCommand>;

#[derive(Debug)]
pub enum HubCommand {
    Connect { tx: ConnectionTx },
    Message { from: ClientId, raw: String },
    Disconnect { from: ClientId },
}

struct Hub {
    hub_state: HubState,
    connections: ConnectionTxStorage,
}

impl Hub {
    fn new(hub_state: HubState) -> Self {
        Self {
            hub_state,
            connections: ConnectionTxStorage::new(),
        }
    }

    fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { tx } => {
                let (client_id, init) = self.hub_state.connect();
                self.connections.insert(client_id.clone(), tx);
                log::info!(
                    "Connection {} joined ({} open)",
                    client_id,
                    self.connections.len()
                );
                self.connections.send(
                    &client_id,
                    ConnectionEvent::Connected {
                        client_id: client_id.clone(),
                    },
                );
                self.connections.send_message(&client_id, &init);
            }
            HubCommand::Message { from, raw } => match self.hub_state.handle_message(&raw) {
                Ok(Some(broadcast)) => self.connections.broadcast(&broadcast),
                Ok(None) => {}
                Err(e) => log::warn!("Ignoring payload from {}: {}", from, e),
            },
            HubCommand::Disconnect { from } => {
                if self.connections.remove(&from).is_some() {
                    let broadcast = self.hub_state.disconnect(&from);
                    self.connections.broadcast(&broadcast);
                } else {
                    log::debug!("Connection {} was already removed", from);
                }
            }
        }
    }
}

pub fn spawn_hub() -> HubTx {
    spawn_hub_with(HubState::new())
}

pub fn spawn_hub_with(hub_state: HubState) -> HubTx {
    let (hub_tx, mut hub_rx) = unbounded_channel::<HubCommand>();

    tokio::spawn(async move {
        let mut hub = Hub::new(hub_state);
        log::info!("hub task - started");

        while let Some(command) = hub_rx.recv().await {
            hub.handle_command(command);
        }
        log::info!("hub task - terminated");
    });

    hub_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{SequentialIdentity, ServerMessage};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn hub() -> Hub {
        Hub::new(HubState::with_identity(Box::new(SequentialIdentity::new())))
    }

    fn connect(hub: &mut Hub) -> (ClientId, UnboundedReceiver<ConnectionEvent>) {
        let (tx, mut rx) = unbounded_channel();
        hub.handle_command(HubCommand::Connect { tx });
        let client_id = match rx.try_recv() {
            Ok(ConnectionEvent::Connected { client_id }) => client_id,
            other => panic!("unexpected event: {:?}", other),
        };
        match next_message(&mut rx) {
            ServerMessage::Init { .. } => {}
            other => panic!("unexpected message: {:?}", other),
        }
        (client_id, rx)
    }

    fn next_message(rx: &mut UnboundedReceiver<ConnectionEvent>) -> ServerMessage {
        match rx.try_recv() {
            Ok(ConnectionEvent::Frame(text)) => ServerMessage::parse(&text).expect(""),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn it_echoes_update_to_sender_and_others() {
        let mut hub = hub();
        let (a, mut a_rx) = connect(&mut hub);
        let (_, mut b_rx) = connect(&mut hub);

        hub.handle_command(HubCommand::Message {
            from: a,
            raw: r#"{"type":"update","data":"hello"}"#.into(),
        });

        let expected = ServerMessage::Update {
            data: "hello".into(),
        };
        assert_eq!(next_message(&mut a_rx), expected);
        assert_eq!(next_message(&mut b_rx), expected);
    }

    #[test]
    fn it_does_not_tell_existing_connections_about_newcomer() {
        let mut hub = hub();
        let (_, mut a_rx) = connect(&mut hub);
        let (_, _b_rx) = connect(&mut hub);
        assert!(a_rx.try_recv().is_err());
    }

    #[test]
    fn it_keeps_connection_open_after_malformed_payload() {
        let mut hub = hub();
        let (a, mut a_rx) = connect(&mut hub);
        hub.handle_command(HubCommand::Message {
            from: a.clone(),
            raw: "}{".into(),
        });
        assert!(a_rx.try_recv().is_err());

        hub.handle_command(HubCommand::Message {
            from: a,
            raw: r#"{"type":"update","data":"still here"}"#.into(),
        });
        assert_eq!(
            next_message(&mut a_rx),
            ServerMessage::Update {
                data: "still here".into()
            }
        );
    }

    #[test]
    fn it_broadcasts_registry_to_remaining_connections_on_disconnect() {
        let mut hub = hub();
        let (a, a_rx) = connect(&mut hub);
        let (b, mut b_rx) = connect(&mut hub);
        drop(a_rx);

        hub.handle_command(HubCommand::Disconnect { from: a.clone() });
        match next_message(&mut b_rx) {
            ServerMessage::Cursor { cursors } => {
                assert!(!cursors.contains_key(&a));
                assert!(cursors.contains_key(&b));
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(hub.connections.len(), 1);

        hub.handle_command(HubCommand::Disconnect { from: a });
        assert!(b_rx.try_recv().is_err());
    }
}
