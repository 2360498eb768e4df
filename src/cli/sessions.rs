//! Session list/show/delete command handlers.

use std::path::Path;

use anyhow::{Context, Result};

use chipclaw::session::{Role, SessionManager};

use super::common::load_config;
use super::SessionsAction;

pub(crate) async fn cmd_sessions(config_path: &Path, action: SessionsAction) -> Result<()> {
    let config = load_config(config_path)?;
    let sessions = SessionManager::new(config.sessions_path())
        .context("Failed to open session storage")?;

    match action {
        SessionsAction::List => {
            let keys = sessions.list().await?;
            if keys.is_empty() {
                println!("No sessions in {}", config.sessions_path().display());
                return Ok(());
            }
            for key in &keys {
                let session = sessions.get_or_create(key).await;
                println!("{:<40} {:>4} record(s)", key, session.len());
            }
        }
        SessionsAction::Show { key } => {
            if !sessions.exists(&key).await {
                anyhow::bail!("No session named '{}'", key);
            }
            let session = sessions.get_or_create(&key).await;
            for message in &session.messages {
                match (&message.role, &message.tool_calls) {
                    (Role::Assistant, Some(calls)) => {
                        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                        println!("[assistant -> {}] {}", names.join(", "), message.content);
                    }
                    (Role::Tool, _) => println!(
                        "[tool {}] {}",
                        message.tool_call_id.as_deref().unwrap_or("?"),
                        message.content
                    ),
                    (role, _) => println!("[{}] {}", role, message.content),
                }
            }
        }
        SessionsAction::Delete { key } => {
            sessions.delete(&key).await?;
            println!("Deleted session '{}'", key);
        }
    }
    Ok(())
}
