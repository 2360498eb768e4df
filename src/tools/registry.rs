//! Tool registry for ChipClaw
//!
//! This module provides the `ToolRegistry` struct for managing and executing tools.
//! Tools are kept in registration order, looked up by name, and executed with
//! every failure turned into a result string.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::providers::ToolDefinition;
use crate::utils::panic_message;

use super::{Tool, ToolContext};

/// An ordered registry of tools.
///
/// Registering a second tool under an existing name replaces the first one in
/// place: the registry still lists the name once, at its original position.
///
/// # Example
///
/// ```rust
/// use chipclaw::tools::{ToolContext, ToolRegistry, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(EchoTool));
///
/// assert!(registry.has("echo"));
///
/// let ctx = ToolContext::new();
/// let result = registry.execute("echo", json!({"message": "hello"}), &ctx).await;
/// assert_eq!(result, "hello");
/// # });
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool under its declared name.
    ///
    /// An existing tool with the same name is overwritten.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => {
                info!(tool = %name, "Replacing tool");
                self.tools[slot] = tool;
            }
            None => {
                info!(tool = %name, "Registering tool");
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&slot| self.tools[slot].as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Never fails: a missing tool, an error returned by the tool, or a panic
    /// inside it all come back as an `Error...` string that can be handed to
    /// the model as the tool result.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> String {
        let Some(tool) = self.get(name) else {
            error!(tool = name, "Tool not found");
            return format!("Error: Tool '{}' not found", name);
        };

        let start = Instant::now();
        let outcome = AssertUnwindSafe(tool.execute(args, ctx))
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(output)) => {
                debug!(tool = name, duration_ms, "Tool executed successfully");
                output
            }
            Ok(Err(e)) => {
                error!(tool = name, error = %e, duration_ms, "Tool execution failed");
                format!("Error executing tool '{}': {}: {}", name, e.kind(), e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = name, panic = %message, duration_ms, "Tool panicked");
                format!("Error executing tool '{}': Panic: {}", name, message)
            }
        }
    }

    /// Tool schemas for the LLM, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
