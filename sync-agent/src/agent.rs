use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use actix_codec::Framed;
use awc::error::WsProtocolError;
use awc::{ws, BoxedSocket};
use futures_util::{future, SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use protocol::{Cursors, IdentityGenerator, RandomIdentity};

use crate::storage::LocalStorage;
use crate::sync_state::{Effect, Phase, SyncState};
use crate::AgentError;

pub const RELAY_URL: &str = "ws://localhost:5000/";
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

type Channel = Framed<BoxedSocket, ws::Codec>;
type PendingConnect = Pin<Box<dyn Future<Output = Result<Channel, AgentError>>>>;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub relay_url: String,
    pub reconnect_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            relay_url: RELAY_URL.to_string(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Inputs from the platform and the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    NetworkOnline,
    NetworkOffline,
    Edit(String),
    /// Pointer-driven selection change.
    MoveCursor { start: f64, end: f64 },
    Shutdown,
}

/// What the editor should render.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    PhaseChanged(Phase),
    DocumentChanged(String),
    CursorsChanged(Cursors),
}

#[derive(Debug, Clone)]
pub struct AgentHandle {
    tx: UnboundedSender<AgentCommand>,
}

impl AgentHandle {
    fn send(&self, command: AgentCommand) -> Result<(), AgentError> {
        self.tx.send(command).map_err(|_| AgentError::Stopped)
    }

    pub fn network_online(&self) -> Result<(), AgentError> {
        self.send(AgentCommand::NetworkOnline)
    }

    pub fn network_offline(&self) -> Result<(), AgentError> {
        self.send(AgentCommand::NetworkOffline)
    }

    pub fn edit<T: Into<String>>(&self, document: T) -> Result<(), AgentError> {
        self.send(AgentCommand::Edit(document.into()))
    }

    pub fn move_cursor(&self, start: f64, end: f64) -> Result<(), AgentError> {
        self.send(AgentCommand::MoveCursor { start, end })
    }

    pub fn shutdown(&self) -> Result<(), AgentError> {
        self.send(AgentCommand::Shutdown)
    }
}

/// Starts an agent on the current actix system.
///
/// The returned task finishes after `shutdown`, or once every handle is dropped,
/// with its channel closed either way.
pub fn spawn_agent<S>(
    config: AgentConfig,
    storage: S,
    network_available: bool,
) -> (AgentHandle, UnboundedReceiver<AgentEvent>, JoinHandle<()>)
where
    S: LocalStorage + 'static,
{
    let (command_tx, command_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();
    let local_id = RandomIdentity.client_id();
    let agent = SyncAgent {
        config,
        state: SyncState::new(storage, local_id),
        channel: None,
        pending_connect: None,
        reset_timer: None,
        events: event_tx,
    };
    let task = actix_rt::spawn(agent.run(command_rx, network_available));
    (AgentHandle { tx: command_tx }, event_rx, task)
}

enum Step {
    Command(Option<AgentCommand>),
    Frame(Option<Result<ws::Frame, WsProtocolError>>),
    Connected(Result<Channel, AgentError>),
    ResetElapsed,
}

struct SyncAgent<S> {
    config: AgentConfig,
    state: SyncState<S>,
    channel: Option<Channel>,
    /// Handshake in flight; polled next to commands so the loop never blocks on it.
    pending_connect: Option<PendingConnect>,
    reset_timer: Option<Pin<Box<Sleep>>>,
    events: UnboundedSender<AgentEvent>,
}

impl<S: LocalStorage> SyncAgent<S> {
    async fn run(mut self, mut commands: UnboundedReceiver<AgentCommand>, network_available: bool) {
        log::info!("sync agent - started as {}", self.state.client_id());
        let effects = self.state.start(network_available);
        self.apply(effects).await;

        loop {
            let step = tokio::select! {
                command = commands.recv() => Step::Command(command),
                frame = next_frame(&mut self.channel) => Step::Frame(frame),
                result = wait_connect(&mut self.pending_connect) => Step::Connected(result),
                _ = wait_reset(&mut self.reset_timer) => Step::ResetElapsed,
            };

            let effects = match step {
                Step::Command(None) | Step::Command(Some(AgentCommand::Shutdown)) => break,
                Step::Command(Some(command)) => self.handle_command(command),
                Step::Frame(frame) => self.handle_frame(frame).await,
                Step::Connected(result) => {
                    self.pending_connect = None;
                    self.handle_connected(result)
                }
                Step::ResetElapsed => {
                    self.reset_timer = None;
                    self.state.reset_elapsed()
                }
            };
            self.apply(effects).await;
        }

        let effects = self.state.shutdown();
        self.apply(effects).await;
        log::info!("sync agent - terminated");
    }

    fn handle_command(&mut self, command: AgentCommand) -> Vec<Effect> {
        match command {
            AgentCommand::NetworkOnline => self.state.network_available(),
            AgentCommand::NetworkOffline => self.state.network_unavailable(),
            AgentCommand::Edit(document) => self.state.edit(document),
            AgentCommand::MoveCursor { start, end } => self.state.move_cursor(start, end),
            AgentCommand::Shutdown => self.state.shutdown(),
        }
    }

    fn handle_connected(&mut self, result: Result<Channel, AgentError>) -> Vec<Effect> {
        match result {
            Ok(channel) => {
                // Dropped again by `CloseChannel` if we left Connecting meanwhile.
                self.channel = Some(channel);
                self.state.channel_opened()
            }
            Err(e) => {
                log::warn!("{}", e);
                self.state.channel_closed()
            }
        }
    }

    async fn handle_frame(
        &mut self,
        frame: Option<Result<ws::Frame, WsProtocolError>>,
    ) -> Vec<Effect> {
        match frame {
            Some(Ok(ws::Frame::Text(bytes))) | Some(Ok(ws::Frame::Binary(bytes))) => {
                log::debug!("Ingress size: {}", bytes.len());
                match self.receive(&bytes) {
                    Ok(effects) => effects,
                    Err(e) => {
                        log::warn!("Ignoring inbound payload: {}", e);
                        Vec::new()
                    }
                }
            }
            Some(Ok(ws::Frame::Ping(payload))) => {
                self.write(ws::Message::Pong(payload)).await;
                Vec::new()
            }
            Some(Ok(ws::Frame::Close(reason))) => {
                log::info!("Channel closed by hub: {:?}", reason);
                self.write(ws::Message::Close(reason)).await;
                self.channel = None;
                self.state.channel_closed()
            }
            Some(Ok(_)) => Vec::new(),
            Some(Err(e)) => {
                log::warn!("Channel failed: {}", e);
                self.channel = None;
                self.state.channel_closed()
            }
            None => {
                log::info!("Channel dropped");
                self.channel = None;
                self.state.channel_closed()
            }
        }
    }

    fn receive(&mut self, bytes: &[u8]) -> Result<Vec<Effect>, AgentError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(self.state.receive(text)?)
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenChannel => {
                    let url = self.config.relay_url.clone();
                    self.pending_connect = Some(Box::pin(open_channel(url)));
                }
                Effect::CloseChannel => {
                    if self.pending_connect.take().is_some() {
                        log::debug!("Abandoning handshake in flight");
                    }
                    if let Some(mut channel) = self.channel.take() {
                        if let Err(e) = channel.send(ws::Message::Close(None)).await {
                            log::debug!("Close frame not sent: {}", e);
                        }
                    }
                }
                Effect::Send(message) => match message.encode() {
                    Ok(text) => self.write(ws::Message::Text(text.into())).await,
                    Err(e) => log::error!("{}", e),
                },
                Effect::ScheduleReset => {
                    log::info!("Resetting in {:?}", self.config.reconnect_delay);
                    self.reset_timer =
                        Some(Box::pin(tokio::time::sleep(self.config.reconnect_delay)));
                }
                Effect::PhaseChanged(phase) => self.emit(AgentEvent::PhaseChanged(phase)),
                Effect::DocumentChanged => {
                    let document = self.state.document().to_string();
                    self.emit(AgentEvent::DocumentChanged(document));
                }
                Effect::CursorsChanged => {
                    let cursors = self.state.cursors().clone();
                    self.emit(AgentEvent::CursorsChanged(cursors));
                }
            }
        }
    }

    /// Fire and forget; a closed channel just drops the frame.
    async fn write(&mut self, message: ws::Message) {
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = channel.send(message).await {
                log::debug!("Egress failed: {}", e);
            }
        } else {
            log::debug!("No open channel, dropping frame");
        }
    }

    fn emit(&self, event: AgentEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

async fn open_channel(url: String) -> Result<Channel, AgentError> {
    let (response, channel) = awc::Client::new()
        .ws(url.as_str())
        .connect()
        .await
        .map_err(|e| AgentError::Connect(e.to_string()))?;
    log::info!("Channel open to {} ({})", url, response.status());
    Ok(channel)
}

async fn next_frame(channel: &mut Option<Channel>) -> Option<Result<ws::Frame, WsProtocolError>> {
    match channel {
        Some(channel) => channel.next().await,
        None => future::pending().await,
    }
}

async fn wait_connect(pending: &mut Option<PendingConnect>) -> Result<Channel, AgentError> {
    match pending {
        Some(connect) => connect.as_mut().await,
        None => future::pending().await,
    }
}

async fn wait_reset(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => future::pending().await,
    }
}
