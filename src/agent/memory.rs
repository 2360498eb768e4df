//! Workspace memory files
//!
//! Long-term notes live in `{workspace}/memory/MEMORY.md`; daily notes in
//! `{workspace}/memory/YYYY-MM-DD.md`. Both are plain markdown that the model
//! can also edit through the filesystem tools.

use std::path::{Path, PathBuf};

use chrono::{Duration, Local};
use tracing::warn;

use crate::error::Result;
use crate::utils::today_date;

/// How many days of daily notes go into the system prompt.
pub const DEFAULT_RECENT_DAYS: u32 = 3;

const LONG_TERM_FILE: &str = "MEMORY.md";
const EMPTY_MEMORY: &str = "No memory records yet.";

pub struct MemoryStore {
    memory_dir: PathBuf,
}

impl MemoryStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            memory_dir: workspace.join("memory"),
        }
    }

    pub fn memory_dir(&self) -> &Path {
        &self.memory_dir
    }

    /// Contents of MEMORY.md, or an empty string when absent.
    pub fn read_long_term(&self) -> String {
        read_or_empty(&self.memory_dir.join(LONG_TERM_FILE))
    }

    pub fn write_long_term(&self, content: &str) -> Result<()> {
        std::fs::create_dir_all(&self.memory_dir)?;
        std::fs::write(self.memory_dir.join(LONG_TERM_FILE), content)?;
        Ok(())
    }

    pub fn read_today(&self) -> String {
        read_or_empty(&self.daily_path(&today_date()))
    }

    /// Append to today's note, terminating the entry with a newline.
    pub fn append_today(&self, content: &str) -> Result<()> {
        use std::io::Write;

        std::fs::create_dir_all(&self.memory_dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.daily_path(&today_date()))?;
        file.write_all(content.as_bytes())?;
        if !content.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Non-empty daily notes of the last `days` days, newest first.
    pub fn recent(&self, days: u32) -> Vec<(String, String)> {
        let today = Local::now().date_naive();
        (0..days)
            .filter_map(|offset| {
                let date = (today - Duration::days(i64::from(offset)))
                    .format("%Y-%m-%d")
                    .to_string();
                let content = read_or_empty(&self.daily_path(&date));
                if content.trim().is_empty() {
                    None
                } else {
                    Some((date, content))
                }
            })
            .collect()
    }

    /// Memory rendered for the system prompt.
    pub fn memory_context(&self) -> String {
        let mut sections = Vec::new();

        let long_term = self.read_long_term();
        if !long_term.trim().is_empty() {
            sections.push(format!("## Long-Term Memory\n{}", long_term));
        }

        let recent = self.recent(DEFAULT_RECENT_DAYS);
        if !recent.is_empty() {
            sections.push("## Recent Daily Notes".to_string());
            for (date, content) in recent {
                sections.push(format!("### {}\n{}", date, content));
            }
        }

        if sections.is_empty() {
            EMPTY_MEMORY.to_string()
        } else {
            sections.join("\n\n")
        }
    }

    fn daily_path(&self, date: &str) -> PathBuf {
        self.memory_dir.join(format!("{}.md", date))
    }
}

fn read_or_empty(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read memory file");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_memory_context() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        assert_eq!(store.read_long_term(), "");
        assert_eq!(store.memory_context(), "No memory records yet.");
    }

    #[test]
    fn test_long_term_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        store.write_long_term("LED on pin 2 is red").unwrap();

        assert_eq!(store.read_long_term(), "LED on pin 2 is red");
        assert!(store
            .memory_context()
            .starts_with("## Long-Term Memory\nLED on pin 2 is red"));
    }

    #[test]
    fn test_append_today_adds_newlines() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append_today("first").unwrap();
        store.append_today("second\n").unwrap();

        assert_eq!(store.read_today(), "first\nsecond\n");
        let recent = store.recent(DEFAULT_RECENT_DAYS);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].0, today_date());
        assert!(store.memory_context().contains("## Recent Daily Notes"));
    }

    #[test]
    fn test_recent_skips_blank_notes() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        std::fs::create_dir_all(store.memory_dir()).unwrap();
        std::fs::write(
            store.memory_dir().join(format!("{}.md", today_date())),
            "   \n",
        )
        .unwrap();
        assert!(store.recent(3).is_empty());
    }
}
