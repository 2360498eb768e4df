//! Skills system - markdown skill discovery and loading.
//!
//! A skill is a `SKILL.md` file in its own directory under
//! `{workspace}/skills/`, with optional YAML frontmatter (`name`,
//! `description`, `load: always`). Always-loaded skills are injected into
//! the system prompt; the rest are listed in a short summary.

mod loader;
mod types;

pub use loader::{SkillsLoader, SKILLS_DIR};
pub use types::{Skill, SkillInfo, SkillMetadata};
