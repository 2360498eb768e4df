//! Provider types for ChipClaw
//!
//! This module defines the `LLMProvider` trait the agent loop consumes,
//! together with the request options and the normalized response shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::session::{Message, ToolCall};

/// Definition of a tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use chipclaw::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "gpio_write",
    ///     "Drive a GPIO pin high or low",
    ///     json!({
    ///         "type": "object",
    ///         "properties": { "pin": { "type": "integer" } },
    ///         "required": ["pin"]
    ///     }),
    /// );
    /// assert_eq!(tool.name, "gpio_write");
    /// ```
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Chat-completion backend consumed by the agent loop.
///
/// Implementations translate ChipClaw messages to their wire format. A
/// non-success transport status must surface as an `Err` carrying the status
/// and the response body. Callers never retry.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send one chat completion request.
    ///
    /// `model` overrides the provider default when set.
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse>;

    /// The model used when the caller passes `None`.
    fn default_model(&self) -> &str;

    /// Provider name, used in logs.
    fn name(&self) -> &str;
}

/// Sampling options for a chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Example
    /// ```
    /// use chipclaw::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(4096).with_temperature(0.7);
    /// assert_eq!(options.max_tokens, Some(4096));
    /// assert_eq!(options.temperature, Some(0.7));
    /// ```
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
    /// Any value the wire format reports that we do not model
    Other(String),
}

impl FinishReason {
    /// Parse the wire string, e.g. `"tool_calls"`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized response of one chat completion.
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// Text content, absent when the model only requested tools
    pub content: Option<String>,
    /// Tool calls in the order the model issued them
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: FinishReason,
    /// Token usage, when the backend reports it
    pub usage: Option<Usage>,
}

impl LLMResponse {
    /// A plain text response with no tool calls.
    ///
    /// # Example
    /// ```
    /// use chipclaw::providers::{FinishReason, LLMResponse};
    ///
    /// let response = LLMResponse::text("Done");
    /// assert_eq!(response.content.as_deref(), Some("Done"));
    /// assert_eq!(response.finish_reason, FinishReason::Stop);
    /// assert!(!response.has_tool_calls());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    /// A response requesting tool calls, without text content.
    pub fn with_tools(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool invocation requested by the model, scoped to one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Id issued by the model; must be echoed back on the tool record
    pub id: String,
    pub name: String,
    /// Decoded argument object, handed to the tool
    pub arguments: Value,
    /// Argument blob exactly as the model sent it, echoed back on the
    /// assistant record
    pub raw_arguments: String,
}

impl ToolCallRequest {
    /// A call whose blob is the JSON encoding of `arguments`.
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            raw_arguments: arguments.to_string(),
            arguments,
        }
    }

    /// A call as received on the wire: `raw` is kept untouched and
    /// `arguments` is whatever was decoded from it.
    pub fn from_wire(id: &str, name: &str, raw: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
            raw_arguments: raw.to_string(),
        }
    }

    /// The argument blob as JSON text.
    ///
    /// # Example
    /// ```
    /// use chipclaw::providers::ToolCallRequest;
    /// use serde_json::json;
    ///
    /// let call = ToolCallRequest::new("call_1", "gpio_write", json!({"pin": 2}));
    /// assert_eq!(call.arguments_json(), r#"{"pin":2}"#);
    ///
    /// let call = ToolCallRequest::from_wire("call_2", "gpio_write", "{ \"pin\": 2 }", json!({"pin": 2}));
    /// assert_eq!(call.arguments_json(), "{ \"pin\": 2 }");
    /// ```
    pub fn arguments_json(&self) -> &str {
        &self.raw_arguments
    }

    /// The session record form of this call, carrying the blob verbatim.
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(&self.id, &self.name, &self.raw_arguments)
    }
}

/// Token usage reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}
