use tokio::io::{AsyncBufReadExt, BufReader};

use sync_agent::{spawn_agent, AgentConfig, AgentError, AgentEvent, FileStorage};

const DEFAULT_STORAGE_DIR: &str = ".sync-agent";

/// Headless editor: every stdin line replaces the whole document.
#[actix_rt::main]
async fn main() -> Result<(), AgentError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let storage_dir =
        std::env::var("SYNC_AGENT_STORAGE").unwrap_or_else(|_| DEFAULT_STORAGE_DIR.to_string());
    let storage = FileStorage::new(&storage_dir)?;

    let (handle, mut events, task) = spawn_agent(AgentConfig::default(), storage, true);

    actix_rt::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::PhaseChanged(phase) => log::info!("[{:?}]", phase),
                AgentEvent::DocumentChanged(document) => println!("{}", document),
                AgentEvent::CursorsChanged(cursors) => {
                    for (client_id, cursor) in cursors {
                        log::info!(
                            "cursor {} at {}..{} ({})",
                            client_id,
                            cursor.x,
                            cursor.y,
                            cursor.color
                        );
                    }
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        handle.edit(line)?;
    }

    handle.shutdown()?;
    if let Err(e) = task.await {
        log::error!("sync agent task failed: {}", e);
    }
    Ok(())
}
