//! OpenAI-compatible provider
//!
//! Speaks the Chat Completions wire format, which DeepSeek, OpenAI and most
//! self-hosted gateways accept. Handles message conversion, tool definitions
//! and response parsing.
//!
//! # Example
//!
//! ```rust,ignore
//! use chipclaw::providers::{openai::OpenAIProvider, ChatOptions, LLMProvider};
//! use chipclaw::session::Message;
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key");
//!     let messages = vec![Message::system("You are a device agent."), Message::user("Hello!")];
//!
//!     let response = provider
//!         .chat(messages, vec![], None, ChatOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{:?}", response.content);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ChipClawError, ProviderError, Result};
use crate::session::Message;

use super::{
    parse_provider_error, ChatOptions, FinishReason, LLMProvider, LLMResponse, ToolCallRequest,
    ToolDefinition, Usage,
};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    /// Null for an assistant record that only carries tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: String,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ============================================================================
// Provider
// ============================================================================

/// Provider for any Chat Completions compatible endpoint.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a provider against [`DEFAULT_API_BASE`].
    ///
    /// # Example
    /// ```
    /// use chipclaw::providers::{LLMProvider, OpenAIProvider};
    ///
    /// let provider = OpenAIProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// assert_eq!(provider.default_model(), "deepseek-chat");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    /// Create a provider against a custom base URL (trailing slash removed).
    pub fn with_base_url(api_key: &str, api_base: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Override the default model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

// ============================================================================
// Conversion
// ============================================================================

fn convert_messages(messages: Vec<Message>) -> Vec<WireMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let tool_calls = msg.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|tc| WireToolCall {
                        id: tc.id,
                        r#type: function_type(),
                        function: WireFunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect::<Vec<_>>()
            });

            WireMessage {
                role: msg.role.to_string(),
                content: if msg.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(msg.content)
                },
                tool_calls,
                tool_call_id: msg.tool_call_id,
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<WireTool> {
    tools
        .into_iter()
        .map(|t| WireTool {
            r#type: function_type(),
            function: WireFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

/// Decode a tool argument blob. Text that is not a JSON object is kept
/// under `_raw` so the tool still sees what the model sent.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            warn!(arguments = %raw, "Tool arguments are not a JSON object");
            json!({ "_raw": raw })
        }
    }
}

fn convert_response(response: ChatResponse) -> Result<LLMResponse> {
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        ChipClawError::Provider("Response contained no choices".to_string())
    })?;

    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = parse_arguments(&tc.function.arguments);
            ToolCallRequest::from_wire(&tc.id, &tc.function.name, &tc.function.arguments, arguments)
        })
        .collect();

    let finish_reason = match choice.finish_reason.as_deref() {
        Some(raw) => FinishReason::parse(raw),
        None if !tool_calls.is_empty() => FinishReason::ToolCalls,
        None => FinishReason::Stop,
    };

    Ok(LLMResponse {
        content: choice.message.content,
        tool_calls,
        finish_reason,
        usage: response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
    })
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.model);
        let request = ChatRequest {
            model: model.to_string(),
            messages: convert_messages(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(model = %model, messages = request.messages.len(), "Sending chat request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChipClawError::from(ProviderError::Timeout(e.to_string()))
                } else {
                    ChipClawError::Provider(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_provider_error(status.as_u16(), &body).into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChipClawError::Provider(format!("Failed to parse response: {}", e)))?;

        let llm_response = convert_response(parsed)?;
        debug!(
            finish_reason = %llm_response.finish_reason,
            tool_calls = llm_response.tool_calls.len(),
            "Chat response received"
        );
        Ok(llm_response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;

    #[test]
    fn test_with_base_url_trims_slash() {
        let provider = OpenAIProvider::with_base_url("k", "http://localhost:8080/v1/");
        assert_eq!(provider.api_base(), "http://localhost:8080/v1");
        assert_eq!(
            OpenAIProvider::new("k").with_model("gpt-4o").default_model(),
            "gpt-4o"
        );
    }

    #[test]
    fn test_convert_messages_roles_and_tool_records() {
        let messages = vec![
            Message::system("sys"),
            Message::user("turn on pin 2"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("call_1", "gpio_write", r#"{"pin":2}"#)],
            ),
            Message::tool_result("call_1", "ok"),
        ];
        let converted = convert_messages(messages);

        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].role, "user");
        assert_eq!(converted[2].role, "assistant");
        assert!(converted[2].content.is_none());
        let calls = converted[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"pin":2}"#);
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(converted[3].role, "tool");
        assert_eq!(converted[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = ChatRequest {
            model: "deepseek-chat".to_string(),
            messages: convert_messages(vec![Message::user("hi")]),
            tools: None,
            max_tokens: Some(4096),
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 4096);
        assert!(json.get("tools").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_convert_tools() {
        let converted = convert_tools(vec![ToolDefinition::new(
            "echo",
            "Echo",
            json!({"type": "object"}),
        )]);
        let json = serde_json::to_value(&converted).unwrap();
        assert_eq!(json[0]["type"], "function");
        assert_eq!(json[0]["function"]["name"], "echo");
    }

    #[test]
    fn test_convert_response_tool_calls() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "x", "arguments": "{\"n\":1}"}},
                        {"id": "b", "type": "function", "function": {"name": "y", "arguments": "not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        let parsed: ChatResponse = serde_json::from_value(raw).unwrap();
        let response = convert_response(parsed).unwrap();

        assert!(response.content.is_none());
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls[0].id, "a");
        assert_eq!(response.tool_calls[0].arguments, json!({"n": 1}));
        assert_eq!(response.tool_calls[1].arguments, json!({"_raw": "not json"}));
        assert_eq!(response.tool_calls[1].to_tool_call().arguments, "not json");
        assert_eq!(response.usage, Some(Usage::new(12, 3)));
    }

    #[test]
    fn test_convert_response_text() {
        let raw = json!({
            "choices": [{"message": {"content": "Done"}, "finish_reason": "length"}]
        });
        let response = convert_response(serde_json::from_value(raw).unwrap()).unwrap();
        assert_eq!(response.content.as_deref(), Some("Done"));
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert!(!response.has_tool_calls());
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_convert_response_without_choices_fails() {
        let response = convert_response(ChatResponse {
            choices: vec![],
            usage: None,
        });
        assert!(response.is_err());
    }

    #[test]
    fn test_parse_arguments_empty_is_object() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("[1,2]"), json!({"_raw": "[1,2]"}));
    }
}
