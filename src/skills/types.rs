//! Skills type definitions.

use serde::{Deserialize, Serialize};

/// Loaded skill model.
#[derive(Debug, Clone)]
pub struct Skill {
    /// Directory name under the skills directory.
    pub name: String,
    /// Absolute path to `SKILL.md`.
    pub path: String,
    /// Parsed frontmatter metadata.
    pub metadata: SkillMetadata,
    /// Markdown body content.
    pub content: String,
}

impl Skill {
    /// Frontmatter `name`, falling back to the directory name.
    pub fn display_name(&self) -> &str {
        let name = self.metadata.name.trim();
        if name.is_empty() {
            &self.name
        } else {
            name
        }
    }

    /// Frontmatter `description`, or `"No description"`.
    pub fn description(&self) -> &str {
        let description = self.metadata.description.trim();
        if description.is_empty() {
            "No description"
        } else {
            description
        }
    }

    /// Whether the skill body is injected into every system prompt.
    pub fn is_always(&self) -> bool {
        self.metadata.always || self.metadata.load.as_deref() == Some("always")
    }
}

/// Skill listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillInfo {
    /// Skill name.
    pub name: String,
    /// Skill file path.
    pub path: String,
}

/// Parsed frontmatter metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillMetadata {
    /// Skill name.
    pub name: String,
    /// Skill description.
    pub description: String,
    /// `always` to inject the skill into every prompt.
    pub load: Option<String>,
    /// Boolean spelling of `load: always`.
    pub always: bool,
}
