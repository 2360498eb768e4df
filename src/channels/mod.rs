//! Channels module - device transports (UART, MQTT, console)
//!
//! A channel turns transport traffic into `InboundMessage`s on the bus and
//! delivers the agent's replies back. The `ChannelManager` starts channels
//! and registers each one as the bus's outbound subscriber for its name.
//!
//! ```text
//!  serial line ──┐                              ┌── UartChannel::send
//!  MQTT topic ───┼─► publish_inbound ─► Agent ──┼── MqttChannel::send
//!  stdin ────────┘        (bus)       (loop)    └── ConsoleChannel::send
//!                                        │
//!                                publish_outbound ─► dispatch_outbound
//! ```
//!
//! UART and MQTT are behind the `serial` and `mqtt` cargo features.

mod console;
pub mod line;
mod manager;
#[cfg(feature = "mqtt")]
pub mod mqtt;
mod types;
#[cfg(feature = "serial")]
pub mod uart;

pub use console::ConsoleChannel;
pub use manager::ChannelManager;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttChannel;
pub use types::{BaseChannelConfig, Channel};
#[cfg(feature = "serial")]
pub use uart::UartChannel;
