//! Context builder for agent conversations
//!
//! Assembles the system prompt from the agent identity, the runtime
//! environment, workspace bootstrap files, memory and skills, then frames
//! the history and current message around it.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::session::Message;
use crate::skills::SkillsLoader;

use super::memory::MemoryStore;

/// Workspace files folded into the system prompt, in this order.
pub const BOOTSTRAP_FILES: &[&str] = &["IDENTITY.md", "AGENTS.md", "SOUL.md", "USER.md", "TOOLS.md"];

const DEFAULT_IDENTITY: &str = "You are ChipClaw, an autonomous AI agent that talks to people \
through device channels such as serial ports and MQTT. You have tools to inspect and change \
the workspace, fetch URLs and send messages. Use them when needed, then answer concisely.";

/// Builds the message list sent to the model for one turn.
///
/// # Example
///
/// ```rust
/// use chipclaw::agent::ContextBuilder;
/// use chipclaw::session::{Message, Role};
///
/// let dir = tempfile::tempdir().unwrap();
/// let builder = ContextBuilder::new(dir.path());
///
/// let history = vec![Message::user("Hello"), Message::assistant("Hi there!")];
/// let messages = builder.build_messages(&history, "Blink the LED", Some("uart"), Some("uart_default"));
///
/// assert_eq!(messages.len(), 4);
/// assert_eq!(messages[0].role, Role::System);
/// assert_eq!(messages[3].content, "Blink the LED");
/// ```
pub struct ContextBuilder {
    workspace: PathBuf,
    memory: MemoryStore,
    skills: SkillsLoader,
    identity: String,
}

impl ContextBuilder {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            memory: MemoryStore::new(workspace),
            skills: SkillsLoader::for_workspace(workspace),
            identity: DEFAULT_IDENTITY.to_string(),
        }
    }

    /// Replace the built-in identity paragraph.
    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = identity.to_string();
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn skills(&self) -> &SkillsLoader {
        &self.skills
    }

    /// The full system prompt for a message arriving on `channel`/`chat_id`.
    pub fn build_system_prompt(&self, channel: Option<&str>, chat_id: Option<&str>) -> String {
        let mut sections = vec![format!(
            "# ChipClaw Agent\n\n{}\n\n## Runtime Environment\n{}\n\n## Current Context\n- Channel: {}\n- Chat ID: {}",
            self.identity,
            self.runtime_info(),
            channel.unwrap_or("unknown"),
            chat_id.unwrap_or("unknown"),
        )];

        for file in BOOTSTRAP_FILES {
            if let Some(content) = self.load_bootstrap_file(file) {
                sections.push(format!("## {}\n{}", file, content));
            }
        }

        sections.push(format!("# Memory\n{}", self.memory.memory_context()));

        let always = self.skills.get_always_skills();
        if !always.is_empty() {
            sections.push(format!(
                "# Active Skills\n\n{}",
                self.skills.load_skills_for_context(&always)
            ));
        }
        let summary = self.skills.build_skills_summary();
        if !summary.is_empty() {
            sections.push(summary);
        }
        sections.join("\n\n")
    }

    /// `[system, history..., user]`, in that fixed order.
    pub fn build_messages(
        &self,
        history: &[Message],
        content: &str,
        channel: Option<&str>,
        chat_id: Option<&str>,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(&self.build_system_prompt(channel, chat_id)));
        messages.extend_from_slice(history);
        messages.push(Message::user(content));
        messages
    }

    fn runtime_info(&self) -> String {
        format!(
            "- Platform: {} {}\n- Local time: {}\n- Workspace: {}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
            self.workspace.display()
        )
    }

    fn load_bootstrap_file(&self, name: &str) -> Option<String> {
        let path = self.workspace.join(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to read bootstrap file");
                None
            }
        }
    }
}
