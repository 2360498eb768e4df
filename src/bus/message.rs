//! Message types for the ChipClaw message bus
//!
//! This module defines the envelopes exchanged between channels, the agent
//! loop and the bus. Inbound messages are immutable once built; a reply keeps
//! a shared handle to the message that triggered it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Represents an incoming message from a channel (e.g., UART, MQTT)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The channel this message came from (e.g., "uart", "mqtt")
    pub channel: String,
    /// Identifier of the sender
    pub sender_id: String,
    /// Identifier of the chat/conversation
    pub chat_id: String,
    /// The text content of the message
    pub content: String,
    /// Optional raw media payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<u8>>,
    /// Additional channel-specific metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Session key for routing (format: "channel:chat_id")
    pub session_key: String,
}

/// Represents an outgoing message to be sent via a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// The channel to send this message through
    pub channel: String,
    /// The chat/conversation to send to
    pub chat_id: String,
    /// The text content to send
    pub content: String,
    /// The inbound message this is a reply to, if any
    #[serde(skip)]
    pub reply_to: Option<Arc<InboundMessage>>,
    /// Optional raw media payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<u8>>,
    /// Additional channel-specific metadata
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl InboundMessage {
    /// Creates a new inbound message with the required fields.
    ///
    /// The session key is derived as "channel:chat_id" and does not depend on
    /// the sender or the content.
    ///
    /// # Example
    /// ```
    /// use chipclaw::bus::message::InboundMessage;
    ///
    /// let msg = InboundMessage::new("mqtt", "sensor-7", "room1", "Hello");
    /// assert_eq!(msg.session_key, "mqtt:room1");
    /// ```
    pub fn new(channel: &str, sender_id: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender_id: sender_id.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            media: None,
            metadata: HashMap::new(),
            session_key: format!("{}:{}", channel, chat_id),
        }
    }

    /// Attaches a media payload (builder pattern).
    pub fn with_media(mut self, media: Vec<u8>) -> Self {
        self.media = Some(media);
        self
    }

    /// Adds a metadata entry (builder pattern).
    ///
    /// # Example
    /// ```
    /// use chipclaw::bus::message::InboundMessage;
    /// use serde_json::json;
    ///
    /// let msg = InboundMessage::new("uart", "uart_user", "uart_default", "hi")
    ///     .with_metadata("rssi", json!(-61));
    /// assert_eq!(msg.metadata.get("rssi"), Some(&json!(-61)));
    /// ```
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

impl OutboundMessage {
    /// Creates a new outbound message.
    ///
    /// # Example
    /// ```
    /// use chipclaw::bus::message::OutboundMessage;
    ///
    /// let msg = OutboundMessage::new("uart", "uart_default", "LED is on");
    /// assert_eq!(msg.channel, "uart");
    /// assert!(msg.reply_to.is_none());
    /// ```
    pub fn new(channel: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            reply_to: None,
            media: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a reply addressed to the channel and chat of `msg`.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use chipclaw::bus::message::{InboundMessage, OutboundMessage};
    ///
    /// let inbound = Arc::new(InboundMessage::new("mqtt", "dev1", "room1", "Hello"));
    /// let reply = OutboundMessage::reply_to(&inbound, "Hello back!");
    /// assert_eq!(reply.chat_id, "room1");
    /// assert!(Arc::ptr_eq(reply.reply_to.as_ref().unwrap(), &inbound));
    /// ```
    pub fn reply_to(msg: &Arc<InboundMessage>, content: &str) -> Self {
        let mut reply = Self::new(&msg.channel, &msg.chat_id, content);
        reply.reply_to = Some(Arc::clone(msg));
        reply
    }

    /// Attaches a media payload (builder pattern).
    pub fn with_media(mut self, media: Vec<u8>) -> Self {
        self.media = Some(media);
        self
    }

    /// Adds a metadata entry (builder pattern).
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_message_creation() {
        let msg = InboundMessage::new("uart", "uart_user", "uart_default", "Hello");
        assert_eq!(msg.channel, "uart");
        assert_eq!(msg.sender_id, "uart_user");
        assert_eq!(msg.chat_id, "uart_default");
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.session_key, "uart:uart_default");
        assert!(!msg.has_media());
        assert!(msg.metadata.is_empty());
    }

    #[test]
    fn test_session_key_ignores_sender_and_content() {
        let a = InboundMessage::new("mqtt", "alice", "room1", "one");
        let b = InboundMessage::new("mqtt", "bob", "room1", "two");
        assert_eq!(a.session_key, "mqtt:room1");
        assert_eq!(a.session_key, b.session_key);
    }

    #[test]
    fn test_inbound_message_with_media_and_metadata() {
        let msg = InboundMessage::new("mqtt", "cam", "yard", "snapshot")
            .with_media(vec![0xff, 0xd8])
            .with_metadata("topic", "chipclaw/in")
            .with_metadata("qos", json!(1));

        assert_eq!(msg.media.as_deref(), Some(&[0xff, 0xd8][..]));
        assert_eq!(msg.metadata.get("topic"), Some(&json!("chipclaw/in")));
        assert_eq!(msg.metadata.get("qos"), Some(&json!(1)));
    }

    #[test]
    fn test_outbound_reply_to_inbound() {
        let inbound = Arc::new(InboundMessage::new("uart", "u", "c", "Hello"));
        let response = OutboundMessage::reply_to(&inbound, "Hello back!");

        assert_eq!(response.channel, "uart");
        assert_eq!(response.chat_id, "c");
        assert_eq!(response.content, "Hello back!");
        assert_eq!(response.reply_to.as_deref(), Some(&*inbound));
    }

    #[test]
    fn test_outbound_serialization_skips_reply_handle() {
        let inbound = Arc::new(InboundMessage::new("mqtt", "u", "room1", "hi"));
        let msg = OutboundMessage::reply_to(&inbound, "done").with_metadata("retain", false);

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("reply_to").is_none());
        assert_eq!(json["metadata"]["retain"], json!(false));

        let back: OutboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.content, "done");
        assert!(back.reply_to.is_none());
    }
}
