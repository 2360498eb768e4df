//! Configuration management for ChipClaw
//!
//! Configuration is loaded from `~/.chipclaw/config.json`, merged over the
//! defaults, then patched by `CHIPCLAW_*` environment variables. The result is
//! validated once at startup and shared read-only as `Arc<Config>`.

mod types;
pub mod validate;

pub use types::*;

use crate::error::{ChipClawError, Result};
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the ChipClaw configuration directory path (~/.chipclaw)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chipclaw")
    }

    /// Returns the path to the config file (~/.chipclaw/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from `path` with environment overrides.
    ///
    /// A missing file yields the defaults. A file that is not valid JSON for
    /// this schema is a `Config` error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                ChipClawError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CHIPCLAW_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` as the variable source.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("CHIPCLAW_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Some(val) = lookup("CHIPCLAW_AGENT_WORKSPACE") {
            self.agent.workspace = val;
        }
        if let Some(val) = lookup("CHIPCLAW_AGENT_MAX_TOOL_ITERATIONS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tool_iterations = v;
            }
        }
        if let Some(val) = lookup("CHIPCLAW_AGENT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tokens = v;
            }
        }
        if let Some(val) = lookup("CHIPCLAW_PROVIDER_API_KEY") {
            self.provider.api_key = val;
        }
        if let Some(val) = lookup("CHIPCLAW_PROVIDER_API_BASE") {
            self.provider.api_base = val;
        }
        if let Some(val) = lookup("CHIPCLAW_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Check value ranges. Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_tool_iterations == 0 {
            return Err(ChipClawError::Config(
                "agent.max_tool_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.max_tokens == 0 {
            return Err(ChipClawError::Config(
                "agent.max_tokens must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ChipClawError::Config(format!(
                "agent.temperature must be within [0, 2], got {}",
                self.agent.temperature
            )));
        }
        if self.agent.bus_capacity == 0 {
            return Err(ChipClawError::Config(
                "agent.bus_capacity must be at least 1".to_string(),
            ));
        }
        if self.channels.uart.enabled && self.channels.uart.port.trim().is_empty() {
            return Err(ChipClawError::Config(
                "channels.uart.port is required when the UART channel is enabled".to_string(),
            ));
        }
        if self.channels.mqtt.enabled && self.channels.mqtt.broker.trim().is_empty() {
            return Err(ChipClawError::Config(
                "channels.mqtt.broker is required when the MQTT channel is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// The workspace directory with `~/` expanded.
    pub fn workspace_path(&self) -> PathBuf {
        expand_home(&self.agent.workspace)
    }

    /// The data directory with `~/` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.agent.data_dir)
    }

    /// Where session logs are stored.
    pub fn sessions_path(&self) -> PathBuf {
        self.data_path().join("sessions")
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}
