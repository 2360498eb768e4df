//! Agent command handler (single message + interactive mode).

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use chipclaw::agent::AgentLoop;
use chipclaw::bus::{InboundMessage, MessageBus};

use super::common::{create_agent, init_logging, load_config};

/// Run one message, or read messages from stdin until EOF or `exit`.
pub(crate) async fn cmd_agent(
    config_path: &Path,
    message: Option<String>,
    chat_id: &str,
) -> Result<()> {
    let config = load_config(config_path)?;
    init_logging(&config);

    let bus = Arc::new(MessageBus::with_capacity(
        config.agent.bus_capacity,
        config.agent.bus_capacity,
    ));
    let agent = create_agent(Arc::new(config), bus).await?;

    if let Some(message) = message {
        let reply = ask(&agent, chat_id, &message).await?;
        println!("{}", reply);
        return Ok(());
    }

    println!("ChipClaw interactive mode. Type 'exit' to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match ask(&agent, chat_id, line).await {
            Ok(reply) => println!("\n{}\n", reply),
            Err(e) => eprintln!("\nError: {:#}\n", e),
        }
    }
    Ok(())
}

async fn ask(agent: &AgentLoop, chat_id: &str, content: &str) -> Result<String> {
    let inbound = Arc::new(InboundMessage::new("cli", "cli_user", chat_id, content));
    agent
        .process_message(&inbound)
        .await
        .context("Agent failed to process message")
}
