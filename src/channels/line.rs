//! Newline-delimited message framing shared by the UART and console channels.
//!
//! Inbound, every non-blank line is one message: either a JSON object with
//! optional `content`, `sender_id` and `chat_id` fields, or plain text.
//! Outbound, every reply is one JSON line `{"content": .., "chat_id": ..}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::bus::{InboundMessage, MessageBus, OutboundMessage};
use crate::error::{ChipClawError, Result};
use crate::log_component;
use crate::utils::string::preview;

use super::BaseChannelConfig;

/// Sender and chat used when a line does not name its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDefaults {
    pub sender_id: &'static str,
    pub chat_id: &'static str,
}

pub const UART_DEFAULTS: LineDefaults = LineDefaults {
    sender_id: "uart_user",
    chat_id: "uart_default",
};

pub const CONSOLE_DEFAULTS: LineDefaults = LineDefaults {
    sender_id: "console_user",
    chat_id: "console",
};

/// One decoded inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub content: String,
    pub sender_id: String,
    pub chat_id: String,
}

#[derive(Deserialize)]
struct LineEnvelope {
    content: Option<String>,
    sender_id: Option<String>,
    chat_id: Option<String>,
}

#[derive(Serialize)]
struct ReplyEnvelope<'a> {
    content: &'a str,
    chat_id: &'a str,
}

/// Decode one line. Returns `None` for blank lines.
///
/// A JSON object without `content` uses the whole line as the content. Any
/// other JSON value, or JSON with fields of the wrong type, is plain text.
///
/// ```
/// use chipclaw::channels::line::{parse_line, UART_DEFAULTS};
///
/// let parsed = parse_line(r#"{"content":"led on","chat_id":"bench"}"#, &UART_DEFAULTS).unwrap();
/// assert_eq!(parsed.content, "led on");
/// assert_eq!(parsed.sender_id, "uart_user");
/// assert_eq!(parsed.chat_id, "bench");
///
/// let plain = parse_line("  what is the temperature?\r", &UART_DEFAULTS).unwrap();
/// assert_eq!(plain.content, "what is the temperature?");
///
/// assert!(parse_line("   ", &UART_DEFAULTS).is_none());
/// ```
pub fn parse_line(line: &str, defaults: &LineDefaults) -> Option<ParsedLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let envelope = if line.starts_with('{') {
        serde_json::from_str::<LineEnvelope>(line).ok()
    } else {
        None
    };

    Some(match envelope {
        Some(env) => ParsedLine {
            content: env.content.unwrap_or_else(|| line.to_string()),
            sender_id: env
                .sender_id
                .unwrap_or_else(|| defaults.sender_id.to_string()),
            chat_id: env.chat_id.unwrap_or_else(|| defaults.chat_id.to_string()),
        },
        None => ParsedLine {
            content: line.to_string(),
            sender_id: defaults.sender_id.to_string(),
            chat_id: defaults.chat_id.to_string(),
        },
    })
}

/// Encode a reply as a single JSON line, newline included.
pub fn encode_outbound(msg: &OutboundMessage) -> Result<String> {
    let mut line = serde_json::to_string(&ReplyEnvelope {
        content: &msg.content,
        chat_id: &msg.chat_id,
    })?;
    line.push('\n');
    Ok(line)
}

/// Write one encoded reply and flush.
pub async fn write_reply<W>(writer: &mut W, msg: &OutboundMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_outbound(msg)?;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| ChipClawError::Channel(format!("{}: write failed: {}", msg.channel, e)))?;
    writer
        .flush()
        .await
        .map_err(|e| ChipClawError::Channel(format!("{}: flush failed: {}", msg.channel, e)))?;
    Ok(())
}

/// Read lines until EOF or shutdown, publishing each accepted message.
///
/// Lines from senders outside the allowlist are dropped. Returns the number
/// of messages published.
pub async fn read_lines<R>(
    reader: R,
    config: &BaseChannelConfig,
    defaults: &LineDefaults,
    bus: Arc<MessageBus>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let channel = config.name.as_str();
    let mut lines = reader.lines();
    let mut published = 0;

    loop {
        let line = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            next = lines.next_line() => match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    log_component!(info, channel, "Input closed");
                    break;
                }
                Err(e) => {
                    log_component!(error, channel, "Read failed", error = %e);
                    break;
                }
            }
        };

        let Some(parsed) = parse_line(&line, defaults) else {
            continue;
        };
        if !config.is_allowed(&parsed.sender_id) {
            log_component!(warn, channel, "Dropping message from sender not in allowlist", sender_id = %parsed.sender_id);
            continue;
        }

        log_component!(debug, channel, "Line received", chat_id = %parsed.chat_id, content = %preview(&parsed.content, 50));
        let msg = InboundMessage::new(channel, &parsed.sender_id, &parsed.chat_id, &parsed.content);
        if let Err(e) = bus.publish_inbound(msg).await {
            log_component!(error, channel, "Failed to publish inbound message", error = %e);
            break;
        }
        published += 1;
    }

    published
}
