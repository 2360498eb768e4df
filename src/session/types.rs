//! Session types for ChipClaw
//!
//! This module defines the conversation log types: sessions, role-tagged
//! message records, and the tool calls an assistant record can carry.

use serde::{Deserialize, Serialize};

/// The ordered message log of one conversation.
///
/// Records are kept in chronological order. Appending is purely in memory;
/// the [`SessionManager`](super::SessionManager) persists a session only when
/// `save` is called, so a whole turn is written at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session key, `"channel:chat_id"`
    pub key: String,
    /// Message records, oldest first
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            messages: Vec::new(),
        }
    }

    /// Appends one record in memory.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The most recent `max` records, oldest first. Does not modify the session.
    ///
    /// # Example
    /// ```
    /// use chipclaw::session::{Message, Session};
    ///
    /// let mut session = Session::new("uart:uart_default");
    /// for text in ["one", "two", "three"] {
    ///     session.add_message(Message::user(text));
    /// }
    /// let recent: Vec<&str> = session.get_history(2).iter().map(|m| m.content.as_str()).collect();
    /// assert_eq!(recent, vec!["two", "three"]);
    /// assert_eq!(session.len(), 3);
    /// ```
    pub fn get_history(&self, max: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(max);
        &self.messages[start..]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// One role-tagged record in a conversation.
///
/// Serialized as a single JSON object; optional fields are omitted when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// A "tool" record answering the call with id `tool_call_id`.
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// An assistant record that requests tool calls.
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call carried verbatim on an assistant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Id issued by the model; echoed back on the matching tool record
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_window_shorter_than_log() {
        let mut session = Session::new("k");
        session.add_message(Message::user("a"));
        session.add_message(Message::assistant("b"));

        assert_eq!(session.get_history(20).len(), 2);
        assert!(session.get_history(0).is_empty());
    }

    #[test]
    fn test_message_json_omits_unset_fields() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);

        let tool = serde_json::to_value(Message::tool_result("call_1", "ok")).unwrap();
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");
        assert!(tool.get("tool_calls").is_none());
    }

    #[test]
    fn test_assistant_with_tools() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "gpio", r#"{"pin":2}"#)],
        );
        assert!(msg.has_tool_calls());
        assert!(!Message::assistant("done").has_tool_calls());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::Tool.to_string(), "tool");
    }
}
