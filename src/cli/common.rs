//! Shared CLI helpers used across multiple command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chipclaw::agent::AgentLoop;
use chipclaw::bus::MessageBus;
use chipclaw::config::Config;
use chipclaw::providers::{LLMProvider, OpenAIProvider};
use chipclaw::session::SessionManager;
use chipclaw::tools::curl::CurlTool;
use chipclaw::tools::filesystem::{ListDirTool, ReadFileTool, WriteFileTool};
use chipclaw::tools::http_fetch::HttpFetchTool;
use chipclaw::tools::MessageTool;

/// Load, validate and return the configuration at `path`.
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_from_path(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Install the global subscriber. Failing to do so is not fatal.
pub(crate) fn init_logging(config: &Config) {
    if let Err(e) = chipclaw::utils::logging::init_logging(&config.logging) {
        eprintln!("Warning: {}", e);
    }
}

pub(crate) fn create_provider(config: &Config) -> Arc<dyn LLMProvider> {
    if config.provider.api_key.trim().is_empty() {
        warn!(
            "No API key configured. Set CHIPCLAW_PROVIDER_API_KEY or provider.api_key in {}",
            Config::path().display()
        );
    }
    Arc::new(
        OpenAIProvider::with_base_url(&config.provider.api_key, &config.provider.api_base)
            .with_model(&config.agent.model),
    )
}

/// Build an agent with the standard tool set, backed by on-disk sessions.
pub(crate) async fn create_agent(config: Arc<Config>, bus: Arc<MessageBus>) -> Result<AgentLoop> {
    let workspace = config.workspace_path();
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

    let sessions = SessionManager::new(config.sessions_path())
        .context("Failed to open session storage")?;
    let provider = create_provider(&config);
    let agent = AgentLoop::new(config, sessions, bus.clone(), provider);

    agent.register_tool(Box::new(MessageTool::new(bus))).await;
    agent.register_tool(Box::new(ReadFileTool)).await;
    agent.register_tool(Box::new(WriteFileTool)).await;
    agent.register_tool(Box::new(ListDirTool)).await;
    agent.register_tool(Box::new(HttpFetchTool::new())).await;
    agent.register_tool(Box::new(CurlTool::new())).await;

    info!(
        tools = agent.tool_count().await,
        workspace = %workspace.display(),
        "Agent ready"
    );
    Ok(agent)
}

/// Mask all but the last four characters of a secret.
pub(crate) fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
