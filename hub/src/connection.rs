use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

use protocol::ClientId;

use crate::hub::{HubCommand, HubTx};

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { client_id: ClientId },
    /// Encoded `ServerMessage`, written as one text frame.
    Frame(String),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    /// Waiting for the hub to assign an id. Frames read meanwhile are queued.
    Idle { pending: Vec<String> },
    Connected(ClientId),
    Closed,
}

struct ConnectionActor {
    state: ConnectionState,
    hub_tx: HubTx,
}

impl ConnectionActor {
    fn new(hub_tx: HubTx) -> Self {
        Self {
            state: ConnectionState::Idle {
                pending: Vec::new(),
            },
            hub_tx,
        }
    }

    fn forward(&mut self, raw: String) {
        match &mut self.state {
            ConnectionState::Idle { pending } => pending.push(raw),
            ConnectionState::Connected(from) => {
                let command = HubCommand::Message {
                    from: from.clone(),
                    raw,
                };
                if self.hub_tx.send(command).is_err() {
                    log::error!("hub task is gone");
                }
            }
            ConnectionState::Closed => {}
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ConnectionEvent>();

        if self.hub_tx.send(HubCommand::Connect { tx }).is_err() {
            log::error!("hub task is gone, refusing connection");
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();
        let hub_tx = self.hub_tx.clone();

        tokio::spawn(async move {
            log::debug!("connection green thread - started");
            while let Some(event) = rx.recv().await {
                if !addr.connected() {
                    // The socket went away before the hub answered; release the id it handed out.
                    if let ConnectionEvent::Connected { client_id } = event {
                        let _ = hub_tx.send(HubCommand::Disconnect { from: client_id });
                    }
                    break;
                }
                addr.do_send(ConnectionActorMessage(event));
            }
            log::debug!("connection green thread - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
        if let ConnectionState::Connected(from) = state {
            log::info!("Connection {} closed", from);
            let _ = self.hub_tx.send(HubCommand::Disconnect { from });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                log::debug!("Ingress size: {}", text.len());
                self.forward(text.to_string());
            }
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ingress size: {}", bin.len());
                match String::from_utf8(bin.to_vec()) {
                    Ok(text) => self.forward(text),
                    Err(e) => log::warn!("Ignoring binary frame: {}", e),
                }
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(e) => {
                log::warn!("Protocol error, closing: {}", e);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { client_id } => {
                match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                    ConnectionState::Idle { pending } => {
                        log::info!("Connection {} accepted", client_id);
                        self.state = ConnectionState::Connected(client_id);
                        for raw in pending {
                            self.forward(raw);
                        }
                    }
                    state => self.state = state,
                }
            }
            ConnectionEvent::Frame(text) => {
                log::debug!("Egress {}", text);
                ctx.text(text);
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    hub_tx: web::Data<HubTx>,
) -> Result<HttpResponse, Error> {
    ws::start(ConnectionActor::new(hub_tx.get_ref().clone()), &req, stream)
}
