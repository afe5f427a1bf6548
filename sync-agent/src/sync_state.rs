use protocol::{ClientId, ClientMessage, CursorPosition, Cursors, ProtocolError, ServerMessage};

use crate::storage::{LocalStorage, DOCUMENT_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Offline,
    Connecting,
    Online,
    Reconnecting,
}

/// What the driver has to do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenChannel,
    CloseChannel,
    Send(ClientMessage),
    /// Arm the reset timer; `reset_elapsed` is expected when it fires.
    ScheduleReset,
    PhaseChanged(Phase),
    DocumentChanged,
    CursorsChanged,
}

/// Client-side document, presence and connectivity.
///
/// Pure state machine: it never touches the network, it only says what
/// should happen through the returned effects.
pub struct SyncState<S> {
    phase: Phase,
    document: String,
    cursors: Cursors,
    local_id: ClientId,
    assigned_id: Option<ClientId>,
    /// Local document has edits the hub has not echoed back yet.
    dirty: bool,
    storage: S,
}

impl<S: LocalStorage> SyncState<S> {
    pub fn new(storage: S, local_id: ClientId) -> Self {
        let document = storage.get(DOCUMENT_KEY).unwrap_or_default();
        // A document left over from an earlier run may never have reached the hub.
        let dirty = !document.is_empty();
        Self {
            phase: Phase::Offline,
            document,
            cursors: Cursors::new(),
            local_id,
            assigned_id: None,
            dirty,
            storage,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn cursors(&self) -> &Cursors {
        &self.cursors
    }

    /// The hub-assigned id once `init` arrived, the self-generated one before.
    pub fn client_id(&self) -> &str {
        self.assigned_id.as_deref().unwrap_or(&self.local_id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn start(&mut self, network_available: bool) -> Vec<Effect> {
        if network_available {
            self.network_available()
        } else {
            Vec::new()
        }
    }

    pub fn network_available(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::Offline => {
                let mut effects = self.enter(Phase::Connecting);
                effects.push(Effect::OpenChannel);
                effects
            }
            _ => Vec::new(),
        }
    }

    pub fn network_unavailable(&mut self) -> Vec<Effect> {
        self.go_offline()
    }

    pub fn channel_opened(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Connecting {
            log::debug!("Channel opened while {:?}, closing it", self.phase);
            return vec![Effect::CloseChannel];
        }
        let mut effects = self.enter(Phase::Online);
        let saved = self.storage.get(DOCUMENT_KEY).unwrap_or_default();
        if self.dirty && !saved.is_empty() {
            log::info!("Reconciling {} bytes edited offline", saved.len());
            effects.push(Effect::Send(ClientMessage::Update { data: saved }));
        } else {
            // Nothing worth pushing; let `init` bring the hub's document.
            self.dirty = false;
        }
        effects
    }

    pub fn channel_closed(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::Connecting | Phase::Online => {
                let mut effects = self.enter(Phase::Reconnecting);
                effects.push(Effect::ScheduleReset);
                effects
            }
            _ => Vec::new(),
        }
    }

    /// Stands in for reloading the client: transient state is dropped and the
    /// document comes back from storage before a new channel is opened.
    pub fn reset_elapsed(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Reconnecting {
            return Vec::new();
        }
        self.cursors.clear();
        self.assigned_id = None;
        self.document = self.storage.get(DOCUMENT_KEY).unwrap_or_default();

        let mut effects = vec![Effect::DocumentChanged, Effect::CursorsChanged];
        effects.extend(self.enter(Phase::Connecting));
        effects.push(Effect::OpenChannel);
        effects
    }

    pub fn receive(&mut self, raw: &str) -> Result<Vec<Effect>, ProtocolError> {
        let effects = match ServerMessage::parse(raw)? {
            ServerMessage::Init {
                data,
                cursors,
                client_id,
            } => {
                if let Some(client_id) = client_id {
                    self.assigned_id = Some(client_id);
                }
                self.cursors = cursors;
                if self.dirty {
                    // The echo of our reconciliation update follows and wins.
                    vec![Effect::CursorsChanged]
                } else {
                    self.replace_document(data);
                    vec![Effect::DocumentChanged, Effect::CursorsChanged]
                }
            }
            ServerMessage::Update { data } => {
                self.replace_document(data);
                self.dirty = false;
                vec![Effect::DocumentChanged]
            }
            ServerMessage::Cursor { cursors } => {
                self.cursors = cursors;
                vec![Effect::CursorsChanged]
            }
            ServerMessage::Unknown => {
                log::debug!("Ignoring message of unknown type");
                Vec::new()
            }
        };
        Ok(effects)
    }

    pub fn edit(&mut self, document: String) -> Vec<Effect> {
        self.replace_document(document);
        self.dirty = true;
        if self.phase == Phase::Online {
            vec![Effect::Send(ClientMessage::Update {
                data: self.document.clone(),
            })]
        } else {
            Vec::new()
        }
    }

    pub fn move_cursor(&mut self, start: f64, end: f64) -> Vec<Effect> {
        if self.phase == Phase::Online {
            vec![Effect::Send(ClientMessage::Cursor {
                client_id: self.client_id().to_string(),
                position: CursorPosition::new(start, end),
            })]
        } else {
            Vec::new()
        }
    }

    pub fn shutdown(&mut self) -> Vec<Effect> {
        self.go_offline()
    }

    fn go_offline(&mut self) -> Vec<Effect> {
        let had_channel = matches!(self.phase, Phase::Connecting | Phase::Online);
        if self.phase == Phase::Offline {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if had_channel {
            effects.push(Effect::CloseChannel);
        }
        effects.extend(self.enter(Phase::Offline));
        effects
    }

    fn enter(&mut self, phase: Phase) -> Vec<Effect> {
        log::info!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        vec![Effect::PhaseChanged(phase)]
    }

    fn replace_document(&mut self, document: String) {
        self.document = document;
        if let Err(e) = self.storage.set(DOCUMENT_KEY, &self.document) {
            log::warn!("Local copy not saved: {}", e);
        }
    }
}
