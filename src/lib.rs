//! ChipClaw - an AI agent for serial and MQTT connected devices
//!
//! Device traffic arrives through [`channels`], is queued on the
//! [`bus::MessageBus`], answered by the [`agent::AgentLoop`] with the help of
//! an LLM [`providers`] backend and [`tools`], and persisted per conversation
//! by the [`session::SessionManager`]. Workspace [`skills`] extend the system
//! prompt.

pub mod agent;
pub mod bus;
pub mod channels;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod skills;
pub mod tools;
pub mod utils;

pub use agent::AgentLoop;
pub use bus::{BoundedQueue, InboundMessage, MessageBus, OutboundMessage};
pub use config::Config;
pub use error::{ChipClawError, Result};
pub use providers::{
    ChatOptions, LLMProvider, LLMResponse, OpenAIProvider, ToolCallRequest, ToolDefinition, Usage,
};
pub use session::{Message, Role, Session, SessionManager, ToolCall};
pub use tools::{Tool, ToolContext, ToolRegistry};
