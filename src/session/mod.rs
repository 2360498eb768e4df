//! Session module - Conversation log storage
//!
//! This module provides session management for ChipClaw:
//! - An in-memory cache of sessions keyed by `"channel:chat_id"`
//! - JSONL persistence, one file per session and one message record per line
//! - Lazy loading that tolerates missing files and corrupt lines
//!
//! Saving rewrites the whole file. A crash in the middle of a save can lose
//! the previously persisted history of that session.
//!
//! # Example
//!
//! ```
//! use chipclaw::session::{SessionManager, Message};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SessionManager::new_memory();
//!
//!     let mut session = manager.get_or_create("uart:uart_default").await;
//!     session.add_message(Message::user("Hello!"));
//!     session.add_message(Message::assistant("Hi there!"));
//!
//!     manager.save(&session).await.unwrap();
//! }
//! ```

pub mod types;

pub use types::{Message, Role, Session, ToolCall};

use crate::error::Result;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// File extension of persisted sessions
const SESSION_EXT: &str = "jsonl";

/// Owns the session cache and its on-disk JSONL files.
///
/// Cloning a `SessionManager` yields another handle to the same cache.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    storage_path: Option<PathBuf>,
}

impl SessionManager {
    /// Creates a manager persisting to `path`, creating the directory if needed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(path),
        })
    }

    /// Creates a manager that never touches the disk.
    pub fn new_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: None,
        }
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    /// Returns the session for `key`, loading it from disk on first access.
    ///
    /// Never fails. A missing file yields an empty session, unreadable files
    /// are logged and treated as empty, and malformed lines are skipped.
    pub async fn get_or_create(&self, key: &str) -> Session {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return session.clone();
            }
        }

        let session = match self.session_file(key) {
            Some(path) => load_jsonl(key, &path).await,
            None => Session::new(key),
        };

        let mut sessions = self.sessions.write().await;
        // Another task may have loaded it while we were reading the file.
        sessions
            .entry(key.to_string())
            .or_insert(session)
            .clone()
    }

    /// Writes the full message list of `session`, replacing any previous file.
    ///
    /// The in-memory cache is updated before the write, so the latest state
    /// stays visible even when the disk write fails.
    pub async fn save(&self, session: &Session) -> Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(session.key.clone(), session.clone());
        }

        if let Some(path) = self.session_file(&session.key) {
            let mut body = String::new();
            for message in &session.messages {
                body.push_str(&serde_json::to_string(message)?);
                body.push('\n');
            }
            tokio::fs::write(&path, body).await?;
            debug!(session = %session.key, records = session.len(), "Session saved");
        }

        Ok(())
    }

    /// Removes `key` from memory and disk. Missing sessions are not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.sessions.write().await.remove(key);

        if let Some(path) = self.session_file(key) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Drops the cached copy of `key` without touching its file.
    ///
    /// The next `get_or_create` reloads it from disk.
    pub async fn evict(&self, key: &str) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }

    /// All known session keys (cached or on disk), sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();

        if let Some(ref storage_path) = self.storage_path {
            let mut dir_entries = tokio::fs::read_dir(storage_path).await?;
            while let Some(entry) = dir_entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e == SESSION_EXT).unwrap_or(false) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        let key = unsanitize_key(stem);
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    pub async fn exists(&self, key: &str) -> bool {
        if self.sessions.read().await.contains_key(key) {
            return true;
        }
        self.session_file(key)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    pub async fn clear_cache(&self) {
        self.sessions.write().await.clear();
    }

    pub async fn cache_size(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn session_file(&self, key: &str) -> Option<PathBuf> {
        self.storage_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", sanitize_key(key), SESSION_EXT)))
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new_memory()
    }
}

async fn load_jsonl(key: &str, path: &Path) -> Session {
    let mut session = Session::new(key);
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return session,
        Err(e) => {
            warn!(session = %key, error = %e, "Failed to read session file, starting empty");
            return session;
        }
    };

    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(line) {
            Ok(message) => session.add_message(message),
            Err(e) => warn!(
                session = %key,
                line = lineno + 1,
                error = %e,
                "Skipping malformed session record"
            ),
        }
    }
    debug!(session = %key, records = session.len(), "Session loaded");
    session
}

/// Percent-encodes characters that are unsafe in file names.
///
/// The mapping is reversible so `list` can recover keys from file names.
fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len() * 3);
    for c in key.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            c => result.push(c),
        }
    }
    result
}

fn unsanitize_key(sanitized: &str) -> String {
    let mut result = String::with_capacity(sanitized.len());
    let mut chars = sanitized.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        let hex: String = chars.by_ref().take(2).collect();
        match u8::from_str_radix(&hex, 16) {
            Ok(byte) if hex.len() == 2 && byte.is_ascii() => result.push(byte as char),
            _ => {
                result.push('%');
                result.push_str(&hex);
            }
        }
    }
    result
}
