//! Agent module - Core agent logic and conversation handling
//!
//! The agent is responsible for:
//!
//! - Consuming inbound messages from the bus, one at a time
//! - Building the prompt from workspace files, memory and session history
//! - Calling the LLM provider and executing the tools it requests
//! - Persisting the turn and publishing the reply
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  MessageBus │────>│  AgentLoop  │────>│ LLMProvider │
//! │  (inbound)  │     │             │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │                   │
//!        │                   ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  MessageBus │<────│   Session   │     │    Tool     │
//! │  (outbound) │     │   Manager   │     │  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```

mod context;
mod r#loop;
pub mod memory;

pub use context::{ContextBuilder, BOOTSTRAP_FILES};
pub use memory::MemoryStore;
pub use r#loop::{AgentLoop, PLACEHOLDER_REPLY};
