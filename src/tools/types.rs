//! Tool types for ChipClaw
//!
//! This module defines the `Tool` trait that every tool implements and the
//! `ToolContext` handed to each invocation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// The capability interface shared by every tool the agent can call.
///
/// A tool declares a unique `name`, a human-readable `description`, and a
/// JSON-Schema object describing its parameters. `execute` receives the
/// arguments the model produced plus the per-turn [`ToolContext`].
///
/// Returning `Err` is the normal way for a tool to fail: the registry turns
/// the error into a result string for the model, so tools never need to
/// format their own error replies.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}

/// Per-turn context passed explicitly into every tool invocation.
///
/// The agent loop builds one from the inbound message being processed before
/// the first LLM call of the turn, so tools that publish (like `send_message`)
/// know where the current conversation lives.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Channel of the message being processed
    pub channel: Option<String>,
    /// Chat ID of the message being processed
    pub chat_id: Option<String>,
    /// Workspace root for filesystem tools
    pub workspace: Option<String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: &str, chat_id: &str) -> Self {
        self.channel = Some(channel.to_string());
        self.chat_id = Some(chat_id.to_string());
        self
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }
}
