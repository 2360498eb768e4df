//! Message tool: lets the agent publish to a channel in the middle of a turn.
//!
//! This is the only tool that talks to the bus directly. It holds its own
//! `Arc<MessageBus>` and reads its default destination from the
//! [`ToolContext`] the agent loop builds for the current inbound message.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bus::{MessageBus, OutboundMessage};
use crate::error::{ChipClawError, Result};

use super::{Tool, ToolContext};

/// Publishes an `OutboundMessage` on behalf of the model.
///
/// `channel` and `chat_id` are optional and default to the conversation the
/// agent is currently answering.
pub struct MessageTool {
    bus: Arc<MessageBus>,
}

impl MessageTool {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Tool for MessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to a channel (defaults to current conversation context)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Message text to send"
                },
                "channel": {
                    "type": "string",
                    "description": "Target channel (uart, mqtt). Omit to use the current conversation's channel."
                },
                "chat_id": {
                    "type": "string",
                    "description": "Target chat ID. Omit to use the current conversation's chat."
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChipClawError::Tool("Missing 'content' parameter".to_string()))?;

        let channel = args
            .get("channel")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| ctx.channel.clone())
            .ok_or_else(|| ChipClawError::Tool("No target channel specified".to_string()))?;

        let chat_id = args
            .get("chat_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| ctx.chat_id.clone())
            .ok_or_else(|| ChipClawError::Tool("No target chat_id specified".to_string()))?;

        self.bus
            .publish_outbound(OutboundMessage::new(&channel, &chat_id, content))
            .await?;

        Ok(format!("Message sent to {}:{}", channel, chat_id))
    }
}
