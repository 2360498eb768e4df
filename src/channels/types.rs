//! Channel trait and shared channel configuration
//!
//! A channel is a transport (serial line, MQTT broker, terminal) that turns
//! device traffic into `InboundMessage`s on the bus and writes the agent's
//! `OutboundMessage`s back out.

use async_trait::async_trait;

use crate::bus::OutboundMessage;
use crate::error::Result;

/// The interface every transport implements.
///
/// Channels publish received messages to the bus from their own reader task
/// started in `start`. Delivery of replies happens through `send`, which the
/// `ChannelManager` subscribes on the bus under the channel's name.
///
/// # Example Implementation
///
/// ```
/// use async_trait::async_trait;
/// use chipclaw::channels::{BaseChannelConfig, Channel};
/// use chipclaw::bus::OutboundMessage;
/// use chipclaw::error::Result;
///
/// struct NullChannel {
///     config: BaseChannelConfig,
///     running: bool,
/// }
///
/// #[async_trait]
/// impl Channel for NullChannel {
///     fn name(&self) -> &str {
///         &self.config.name
///     }
///
///     async fn start(&mut self) -> Result<()> {
///         self.running = true;
///         Ok(())
///     }
///
///     async fn stop(&mut self) -> Result<()> {
///         self.running = false;
///         Ok(())
///     }
///
///     async fn send(&self, _msg: OutboundMessage) -> Result<()> {
///         Ok(())
///     }
///
///     fn is_running(&self) -> bool {
///         self.running
///     }
///
///     fn is_allowed(&self, sender_id: &str) -> bool {
///         self.config.is_allowed(sender_id)
///     }
/// }
/// ```
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name, e.g. "uart" or "mqtt". Outbound routing key.
    fn name(&self) -> &str;

    /// Open the transport and spawn the reader.
    async fn start(&mut self) -> Result<()>;

    /// Stop the reader and release the transport.
    async fn stop(&mut self) -> Result<()>;

    /// Deliver one outbound message.
    ///
    /// # Errors
    ///
    /// Returns `ChipClawError::Channel` when the channel is not running or
    /// the transport write fails.
    async fn send(&self, msg: OutboundMessage) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Whether `sender_id` may talk to the agent through this channel.
    fn is_allowed(&self, sender_id: &str) -> bool;
}

/// Configuration common to all channels.
///
/// ```
/// use chipclaw::channels::BaseChannelConfig;
///
/// let config = BaseChannelConfig::with_allowlist("uart", vec!["uart_user".to_string()]);
/// assert!(config.is_allowed("uart_user"));
/// assert!(!config.is_allowed("intruder"));
///
/// let open = BaseChannelConfig::new("console");
/// assert!(open.is_allowed("anyone"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BaseChannelConfig {
    pub name: String,
    /// Allowed sender ids. Empty allows everyone.
    pub allowlist: Vec<String>,
}

impl BaseChannelConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            allowlist: Vec::new(),
        }
    }

    pub fn with_allowlist(name: &str, allowlist: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            allowlist,
        }
    }

    pub fn is_allowed(&self, sender_id: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.iter().any(|s| s == sender_id)
    }
}
