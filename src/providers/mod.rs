//! Providers module - LLM backends
//!
//! Defines the `LLMProvider` trait the agent loop calls and the
//! OpenAI-compatible HTTP implementation used by the gateway.
//!
//! # Example
//!
//! ```rust,ignore
//! use chipclaw::providers::{ChatOptions, LLMProvider, OpenAIProvider};
//! use chipclaw::session::Message;
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key");
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!     let response = provider
//!         .chat(vec![Message::user("Hello!")], vec![], None, options)
//!         .await
//!         .unwrap();
//!     println!("Response: {:?}", response.content);
//! }
//! ```

pub mod openai;
mod types;

use crate::error::ProviderError;

pub use openai::OpenAIProvider;
pub use types::{
    ChatOptions, FinishReason, LLMProvider, LLMResponse, ToolCallRequest, ToolDefinition, Usage,
};

/// Map a non-success HTTP status and body onto a [`ProviderError`].
///
/// The message always carries both the status and the body.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    let detail = format!("HTTP {}: {}", status, body);
    match status {
        401 | 403 => ProviderError::Auth(detail),
        402 => ProviderError::Billing(detail),
        404 => ProviderError::ModelNotFound(detail),
        429 => ProviderError::RateLimit(detail),
        400 => ProviderError::InvalidRequest(detail),
        500..=599 => ProviderError::ServerError(detail),
        _ => ProviderError::Unknown(detail),
    }
}
