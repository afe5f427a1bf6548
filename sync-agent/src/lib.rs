mod agent;
mod error;
mod storage;
mod sync_state;

pub use agent::{
    spawn_agent, AgentCommand, AgentConfig, AgentEvent, AgentHandle, RECONNECT_DELAY, RELAY_URL,
};
pub use error::AgentError;
pub use storage::{FileStorage, LocalStorage, MemoryStorage, DOCUMENT_KEY};
pub use sync_state::{Effect, Phase, SyncState};
