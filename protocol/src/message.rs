use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ClientId = String;

/// Every cursor the hub currently knows about, keyed by the id the owner reported.
pub type Cursors = HashMap<ClientId, CursorRecord>;

/// Selection bounds as sent by a client. `x` is the start, `y` the end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::default::Default for CursorPosition {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub x: f64,
    pub y: f64,
    pub color: String,
}

impl CursorRecord {
    pub fn new(position: CursorPosition, color: String) -> Self {
        Self {
            x: position.x,
            y: position.y,
            color,
        }
    }

    pub fn position(&self) -> CursorPosition {
        CursorPosition::new(self.x, self.y)
    }
}

/// Client → hub frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Replaces the whole document.
    Update { data: String },
    Cursor {
        #[serde(rename = "clientId")]
        client_id: ClientId,
        position: CursorPosition,
    },
    #[serde(other)]
    Unknown,
}

/// Hub → client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once to a freshly accepted connection.
    Init {
        data: String,
        cursors: Cursors,
        /// The id the hub registered for the receiving connection.
        #[serde(
            rename = "clientId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        client_id: Option<ClientId>,
    },
    Update { data: String },
    Cursor { cursors: Cursors },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Malformed)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

impl ServerMessage {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Malformed)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_parses_cursor_message_from_browser_client() {
        let message =
            ClientMessage::parse(r#"{"type":"cursor","clientId":"k3j9x","position":{"x":3,"y":7}}"#)
                .expect("must parse");
        assert_eq!(
            message,
            ClientMessage::Cursor {
                client_id: "k3j9x".into(),
                position: CursorPosition::new(3.0, 7.0),
            }
        );
    }

    #[test]
    fn it_maps_unknown_type_to_unknown() {
        let message = ClientMessage::parse(r#"{"type":"selection","data":"x"}"#).expect("");
        assert_eq!(message, ClientMessage::Unknown);

        let message = ServerMessage::parse(r#"{"type":"presence"}"#).expect("");
        assert_eq!(message, ServerMessage::Unknown);
    }

    #[test]
    fn it_rejects_malformed_payloads() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"update"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"data":"no type"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn it_encodes_init_with_wire_field_names() {
        let mut cursors = Cursors::new();
        cursors.insert(
            "a".into(),
            CursorRecord::new(CursorPosition::default(), "red".into()),
        );
        let message = ServerMessage::Init {
            data: "hello".into(),
            cursors,
            client_id: Some("a".into()),
        };
        let value: serde_json::Value =
            serde_json::from_str(&message.encode().expect("")).expect("");
        assert_eq!(
            value,
            json!({
                "type": "init",
                "data": "hello",
                "cursors": { "a": { "x": 0.0, "y": 0.0, "color": "red" } },
                "clientId": "a",
            })
        );
    }

    #[test]
    fn it_accepts_init_without_client_id() {
        let message = ServerMessage::parse(r#"{"type":"init","data":"","cursors":{}}"#).expect("");
        assert_eq!(
            message,
            ServerMessage::Init {
                data: "".into(),
                cursors: Cursors::new(),
                client_id: None,
            }
        );
    }
}
