//! MQTT channel for networked devices.
//!
//! Subscribes to `topic_in` and publishes replies to `topic_out`. An inbound
//! payload is either a JSON object `{"content", "sender_id", "chat_id"}` or
//! raw UTF-8 text. The sender defaults to `unknown` and the chat to the topic
//! the message arrived on.
//!
//! Requires the `mqtt` feature.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::bus::{InboundMessage, MessageBus, OutboundMessage};
use crate::config::MqttConfig;
use crate::error::{ChipClawError, Result};
use crate::log_component;
use crate::utils::string::preview;

use super::{BaseChannelConfig, Channel};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 16;
const DEFAULT_SENDER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttPayload {
    pub content: String,
    pub sender_id: String,
    pub chat_id: String,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    content: Option<String>,
    sender_id: Option<String>,
    chat_id: Option<String>,
}

#[derive(Serialize)]
struct ReplyEnvelope<'a> {
    content: &'a str,
    chat_id: &'a str,
}

/// Decode a payload received on `topic`. Returns `None` when there is no
/// content to act on.
pub fn parse_payload(topic: &str, payload: &[u8]) -> Option<MqttPayload> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parsed = match serde_json::from_str::<InboundEnvelope>(text) {
        Ok(env) => MqttPayload {
            content: env.content.unwrap_or_default(),
            sender_id: env.sender_id.unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            chat_id: env.chat_id.unwrap_or_else(|| topic.to_string()),
        },
        Err(_) => MqttPayload {
            content: text.to_string(),
            sender_id: DEFAULT_SENDER.to_string(),
            chat_id: topic.to_string(),
        },
    };

    (!parsed.content.trim().is_empty()).then_some(parsed)
}

/// Encode a reply for `topic_out`.
pub fn encode_reply(msg: &OutboundMessage) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&ReplyEnvelope {
        content: &msg.content,
        chat_id: &msg.chat_id,
    })?)
}

pub struct MqttChannel {
    config: MqttConfig,
    base_config: BaseChannelConfig,
    bus: Arc<MessageBus>,
    client: Arc<Mutex<Option<AsyncClient>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    poller: Option<JoinHandle<()>>,
}

impl MqttChannel {
    pub fn new(config: MqttConfig, bus: Arc<MessageBus>) -> Self {
        let base_config = BaseChannelConfig::with_allowlist("mqtt", config.allowlist.clone());
        Self {
            config,
            base_config,
            bus,
            client: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            poller: None,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker.clone(),
            self.config.port,
        );
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = self.config.username.as_deref().filter(|u| !u.is_empty()) {
            options.set_credentials(username, self.config.password.clone().unwrap_or_default());
        }
        options
    }
}

/// Drive the event loop until shutdown, publishing accepted messages to the
/// bus. Connection errors are retried after [`RECONNECT_DELAY`]; the client
/// resubscribes on every successful connection.
async fn poll_events(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topic_in: String,
    base_config: BaseChannelConfig,
    bus: Arc<MessageBus>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log_component!(info, "mqtt", "Connected", topic = %topic_in);
                if let Err(e) = client.subscribe(topic_in.clone(), QoS::AtLeastOnce).await {
                    log_component!(error, "mqtt", "Subscribe failed", error = %e);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let topic = String::from_utf8_lossy(publish.topic.as_ref()).into_owned();
                let Some(payload) = parse_payload(&topic, &publish.payload) else {
                    continue;
                };
                if !base_config.is_allowed(&payload.sender_id) {
                    log_component!(warn, "mqtt", "Dropping message from sender not in allowlist", sender_id = %payload.sender_id);
                    continue;
                }
                log_component!(debug, "mqtt", "Message received", chat_id = %payload.chat_id, content = %preview(&payload.content, 50));
                let msg = InboundMessage::new(
                    "mqtt",
                    &payload.sender_id,
                    &payload.chat_id,
                    &payload.content,
                );
                if let Err(e) = bus.publish_inbound(msg).await {
                    log_component!(error, "mqtt", "Failed to publish inbound message", error = %e);
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                log_component!(warn, "mqtt", "Connection error, retrying", error = %e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl Channel for MqttChannel {
    fn name(&self) -> &str {
        &self.base_config.name
    }

    async fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            log_component!(warn, "mqtt", "Channel already running");
            return Ok(());
        }

        let (client, eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        *self.client.lock().await = Some(client.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.poller = Some(tokio::spawn(poll_events(
            eventloop,
            client,
            self.config.topic_in.clone(),
            self.base_config.clone(),
            self.bus.clone(),
            shutdown_rx,
        )));
        self.shutdown_tx = Some(shutdown_tx);
        self.running.store(true, Ordering::SeqCst);

        log_component!(
            info,
            "mqtt",
            "Channel started",
            broker = %self.config.broker,
            port = self.config.port
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.disconnect().await {
                log_component!(debug, "mqtt", "Disconnect failed", error = %e);
            }
        }
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.poller.take() {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                log_component!(warn, "mqtt", "Event loop did not stop within timeout");
            }
        }
        log_component!(info, "mqtt", "Channel stopped");
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        let client = self.client.lock().await.clone();
        let Some(client) = client else {
            return Err(ChipClawError::Channel("mqtt client not connected".into()));
        };
        let payload = encode_reply(&msg)?;
        client
            .publish(self.config.topic_out.clone(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| ChipClawError::Channel(format!("mqtt publish failed: {}", e)))?;
        log_component!(debug, "mqtt", "Reply published", topic = %self.config.topic_out);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.base_config.is_allowed(sender_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_payload() {
        let payload = parse_payload(
            "chipclaw/in",
            br#"{"content":"water the plants","sender_id":"greenhouse","chat_id":"zone-1"}"#,
        )
        .unwrap();
        assert_eq!(payload.content, "water the plants");
        assert_eq!(payload.sender_id, "greenhouse");
        assert_eq!(payload.chat_id, "zone-1");
    }

    #[test]
    fn test_parse_defaults_to_topic_and_unknown_sender() {
        let payload = parse_payload("chipclaw/in", br#"{"content":"hi"}"#).unwrap();
        assert_eq!(payload.sender_id, "unknown");
        assert_eq!(payload.chat_id, "chipclaw/in");

        let raw = parse_payload("chipclaw/in", b"plain text").unwrap();
        assert_eq!(raw.content, "plain text");
        assert_eq!(raw.chat_id, "chipclaw/in");
    }

    #[test]
    fn test_parse_empty_payloads() {
        assert!(parse_payload("t", b"").is_none());
        assert!(parse_payload("t", b"  \n").is_none());
        assert!(parse_payload("t", br#"{"sender_id":"x"}"#).is_none());
    }

    #[test]
    fn test_encode_reply() {
        let msg = OutboundMessage::new("mqtt", "zone-1", "done");
        assert_eq!(
            encode_reply(&msg).unwrap(),
            br#"{"content":"done","chat_id":"zone-1"}"#.to_vec()
        );
    }

    #[tokio::test]
    async fn test_send_before_start_fails() {
        let channel = MqttChannel::new(MqttConfig::default(), Arc::new(MessageBus::new()));
        assert_eq!(channel.name(), "mqtt");
        assert!(channel
            .send(OutboundMessage::new("mqtt", "c", "x"))
            .await
            .is_err());
    }
}
