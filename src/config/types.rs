//! Configuration type definitions for ChipClaw
//!
//! Every section derives serde with `#[serde(default)]`, so a config file only
//! needs the keys it wants to change; everything else falls back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration struct for ChipClaw
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent loop settings (model, limits, paths)
    pub agent: AgentConfig,
    /// LLM endpoint
    pub provider: ProviderConfig,
    /// Channel configurations (UART, MQTT, console)
    pub channels: ChannelsConfig,
    /// Log output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Workspace holding bootstrap files and memory. A leading `~/` expands to home.
    pub workspace: String,
    /// Directory for runtime data; sessions live in `{data_dir}/sessions`
    pub data_dir: String,
    /// Model name passed to the provider
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on LLM calls per inbound message
    pub max_tool_iterations: u32,
    /// Number of past records replayed to the model
    pub max_session_messages: usize,
    /// Capacity of each bus queue
    pub bus_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workspace: "~/.chipclaw/workspace".to_string(),
            data_dir: "~/.chipclaw/data".to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_tool_iterations: 15,
            max_session_messages: 20,
            bus_capacity: 100,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: crate::providers::openai::DEFAULT_API_BASE.to_string(),
        }
    }
}

// ============================================================================
// Channel Configurations
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub uart: UartConfig,
    pub mqtt: MqttConfig,
    pub console: ConsoleConfig,
}

/// Serial port channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UartConfig {
    pub enabled: bool,
    /// Device path, e.g. `/dev/ttyUSB0`
    pub port: String,
    pub baudrate: u32,
    /// Sender ids allowed to talk to the agent; empty allows everyone
    pub allowlist: Vec<String>,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 115_200,
            allowlist: Vec::new(),
        }
    }
}

/// MQTT broker channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub topic_in: String,
    pub topic_out: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub allowlist: Vec<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: String::new(),
            port: 1883,
            client_id: "chipclaw-01".to_string(),
            topic_in: "chipclaw/in".to_string(),
            topic_out: "chipclaw/out".to_string(),
            username: None,
            password: None,
            allowlist: Vec::new(),
        }
    }
}

/// Interactive stdin/stdout channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset, e.g. `"info"` or `"chipclaw=debug"`
    pub level: String,
    pub format: LogFormat,
    /// Append JSON logs to this file instead of stdout
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            file: None,
        }
    }
}
