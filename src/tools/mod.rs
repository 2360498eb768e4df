//! Tools module - Tool definitions and execution for LLM function calling
//!
//! This module provides the infrastructure for defining and executing tools
//! that the model can call while answering a message.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Execution context (channel, chat_id, workspace)
//! - `ToolRegistry`: Ordered registry that executes tools by name and turns
//!   every failure into a result string
//!
//! # Built-in Tools
//!
//! - `EchoTool`: Simple echo tool for testing
//! - `MessageTool` (`send_message`): Publish to a channel mid-turn
//! - `ReadFileTool`, `WriteFileTool`, `ListDirTool`: Workspace file access
//! - `HttpFetchTool` (`http_fetch`): HTTP GET
//! - `CurlTool` (`curl`): HTTP request with method, headers and body
//!
//! # Example
//!
//! ```rust
//! use chipclaw::tools::{ToolContext, ToolRegistry, EchoTool};
//! use chipclaw::tools::filesystem::ReadFileTool;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.register(Box::new(EchoTool));
//! registry.register(Box::new(ReadFileTool));
//!
//! let ctx = ToolContext::new();
//! let result = registry.execute("echo", json!({"message": "Hello!"}), &ctx).await;
//! assert_eq!(result, "Hello!");
//!
//! assert_eq!(registry.definitions().len(), 2);
//! # });
//! ```

pub mod curl;
pub mod filesystem;
pub mod http_fetch;
pub mod message;
mod registry;
mod types;

pub use message::MessageTool;
pub use registry::ToolRegistry;
pub use types::{Tool, ToolContext};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A simple echo tool for testing purposes.
///
/// # Example
///
/// ```rust
/// use chipclaw::tools::{Tool, ToolContext, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let result = EchoTool.execute(json!({"message": "Hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), "Hello");
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_echo_tool_missing_message() {
        let result = EchoTool.execute(json!({}), &ToolContext::new()).await;
        assert_eq!(result.unwrap(), "(no message)");
    }

    #[test]
    fn test_echo_tool_schema() {
        let params = EchoTool.parameters();
        assert_eq!(params["type"], "object");
        assert_eq!(params["required"][0], "message");
    }
}
