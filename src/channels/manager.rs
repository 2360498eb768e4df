//! Channel Manager for ChipClaw
//!
//! Owns the registered channels, starts and stops them together, and wires
//! each running channel's `send` into the bus as the outbound subscriber for
//! its name. Delivery itself is done by `MessageBus::dispatch_outbound`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::bus::{MessageBus, OutboundMessage};
use crate::config::ChannelsConfig;
use crate::error::{ChipClawError, Result};

use super::{Channel, ConsoleChannel};

type ChannelMap = Arc<RwLock<HashMap<String, Box<dyn Channel>>>>;

/// Lifecycle owner for all channels.
///
/// ```text
///   ┌──────┐ ┌──────┐ ┌─────────┐
///   │ UART │ │ MQTT │ │ Console │   Channel::send
///   └──┬───┘ └──┬───┘ └────┬────┘        ▲
///      │ inbound │         │             │ subscribe_outbound(name)
///      └─────────┴────┬────┘             │
///                ┌────┴──────┐   dispatch_outbound
///                │MessageBus │ ──────────┘
///                └───────────┘
/// ```
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chipclaw::bus::MessageBus;
/// use chipclaw::channels::ChannelManager;
///
/// # tokio_test::block_on(async {
/// let bus = Arc::new(MessageBus::new());
/// let manager = ChannelManager::new(bus);
/// assert!(manager.channels().await.is_empty());
/// # })
/// ```
pub struct ChannelManager {
    channels: ChannelMap,
    bus: Arc<MessageBus>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            bus,
        }
    }

    /// Registers a channel under its name, replacing any channel of the same name.
    pub async fn register(&self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        info!("Registering channel: {}", name);
        self.channels.write().await.insert(name, channel);
    }

    /// Builds and registers every channel enabled in `config`.
    ///
    /// Channels whose transport was compiled out are skipped with a warning.
    /// Returns the number of channels registered.
    pub async fn register_from_config(&self, config: &ChannelsConfig) -> usize {
        let mut count = 0;

        if config.console.enabled {
            self.register(Box::new(ConsoleChannel::new(self.bus.clone())))
                .await;
            count += 1;
        }

        if config.uart.enabled {
            #[cfg(feature = "serial")]
            {
                self.register(Box::new(super::UartChannel::new(
                    config.uart.clone(),
                    self.bus.clone(),
                )))
                .await;
                count += 1;
            }
            #[cfg(not(feature = "serial"))]
            warn!("UART channel enabled but chipclaw was built without the `serial` feature");
        }

        if config.mqtt.enabled {
            #[cfg(feature = "mqtt")]
            {
                self.register(Box::new(super::MqttChannel::new(
                    config.mqtt.clone(),
                    self.bus.clone(),
                )))
                .await;
                count += 1;
            }
            #[cfg(not(feature = "mqtt"))]
            warn!("MQTT channel enabled but chipclaw was built without the `mqtt` feature");
        }

        count
    }

    /// Names of all registered channels, sorted.
    pub async fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn has_channel(&self, name: &str) -> bool {
        self.channels.read().await.contains_key(name)
    }

    /// Starts every channel and subscribes the ones that came up to the bus.
    ///
    /// A channel that fails to start is logged and left unsubscribed; the
    /// others still start. Returns the names of the started channels.
    pub async fn start_all(&self) -> Result<Vec<String>> {
        let mut started = Vec::new();
        {
            let mut channels = self.channels.write().await;
            for (name, channel) in channels.iter_mut() {
                info!("Starting channel: {}", name);
                match channel.start().await {
                    Ok(()) => started.push(name.clone()),
                    Err(e) => error!("Failed to start channel {}: {}", name, e),
                }
            }
        }

        for name in &started {
            self.subscribe(name).await;
        }
        started.sort();
        Ok(started)
    }

    /// Unsubscribes and stops every channel. Individual failures are logged.
    pub async fn stop_all(&self) -> Result<()> {
        let mut channels = self.channels.write().await;
        for (name, channel) in channels.iter_mut() {
            self.bus.unsubscribe_outbound(name).await;
            info!("Stopping channel: {}", name);
            if let Err(e) = channel.stop().await {
                error!("Failed to stop channel {}: {}", name, e);
            }
        }
        Ok(())
    }

    pub fn bus(&self) -> Arc<MessageBus> {
        self.bus.clone()
    }

    async fn subscribe(&self, name: &str) {
        let channels = self.channels.clone();
        let channel_name = name.to_string();
        self.bus
            .subscribe_outbound(name, move |msg: OutboundMessage| {
                let channels = channels.clone();
                let channel_name = channel_name.clone();
                async move {
                    let channels = channels.read().await;
                    match channels.get(&channel_name) {
                        Some(channel) => channel.send(msg).await,
                        None => {
                            warn!("Channel {} was removed while subscribed", channel_name);
                            Err(ChipClawError::NotFound(format!("channel {}", channel_name)))
                        }
                    }
                }
            })
            .await;
    }
}
