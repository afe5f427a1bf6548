use protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to open channel: {0}")]
    Connect(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("frame is not utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("agent has stopped")]
    Stopped,
}
