use protocol::{ClientId, CursorPosition, CursorRecord, Cursors};

/// Cursor of every client the hub has heard of.
///
/// Keys are whatever id the client put in its cursor message, so nothing
/// here is checked against live connections.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    cursors: Cursors,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh connection at the document origin.
    pub fn insert_default(&mut self, client_id: ClientId, color: String) {
        self.cursors.insert(
            client_id,
            CursorRecord::new(CursorPosition::default(), color),
        );
    }

    /// Moves a cursor, keeping its color. Unknown ids get a color from `new_color`.
    pub fn upsert<F>(&mut self, client_id: ClientId, position: CursorPosition, new_color: F)
    where
        F: FnOnce() -> String,
    {
        let color = match self.cursors.get(&client_id) {
            Some(record) => record.color.clone(),
            None => new_color(),
        };
        self.cursors
            .insert(client_id, CursorRecord::new(position, color));
    }

    pub fn remove(&mut self, client_id: &str) -> Option<CursorRecord> {
        self.cursors.remove(client_id)
    }

    pub fn get(&self, client_id: &str) -> Option<&CursorRecord> {
        self.cursors.get(client_id)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn snapshot(&self) -> Cursors {
        self.cursors.clone()
    }
}
