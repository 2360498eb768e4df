//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod common;
pub mod config;
pub mod gateway;
pub mod sessions;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chipclaw")]
#[command(version)]
#[command(about = "AI agent for serial and MQTT connected devices", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.chipclaw/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent with all enabled channels until Ctrl-C
    Gateway,
    /// Talk to the agent from the terminal
    Agent {
        /// Process a single message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Conversation to continue
        #[arg(long, default_value = "cli")]
        chat_id: String,
    },
    /// Inspect stored conversations
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List stored session keys
    List,
    /// Print the records of a session
    Show {
        /// Session key, e.g. "uart:uart_default"
        key: String,
    },
    /// Delete a session log
    Delete {
        /// Session key, e.g. "uart:uart_default"
        key: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (API key masked)
    Show,
    /// Check the configuration file for errors and warnings
    Check,
}

/// Entry point for the CLI — called from main().
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(chipclaw::config::Config::path);

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Gateway) => {
            gateway::cmd_gateway(&config_path).await?;
        }
        Some(Commands::Agent { message, chat_id }) => {
            agent::cmd_agent(&config_path, message, &chat_id).await?;
        }
        Some(Commands::Sessions { action }) => {
            sessions::cmd_sessions(&config_path, action).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(&config_path, action)?;
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("chipclaw {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("AI agent for serial and MQTT connected devices");
}
