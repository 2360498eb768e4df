//! Skills loader and parser.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;

use super::types::{Skill, SkillInfo, SkillMetadata};

/// Directory under the workspace that holds one sub-directory per skill.
pub const SKILLS_DIR: &str = "skills";

/// Discover and load markdown skills from `{workspace}/skills/*/SKILL.md`.
pub struct SkillsLoader {
    skills_dir: PathBuf,
}

impl SkillsLoader {
    /// Create loader over an explicit skills directory.
    pub fn new(skills_dir: PathBuf) -> Self {
        Self { skills_dir }
    }

    /// Create loader for the skills directory of `workspace`.
    pub fn for_workspace(workspace: &Path) -> Self {
        Self::new(workspace.join(SKILLS_DIR))
    }

    pub fn skills_dir(&self) -> &Path {
        &self.skills_dir
    }

    /// List skills that have a `SKILL.md`, sorted by name.
    pub fn list_skills(&self) -> Vec<SkillInfo> {
        let entries = match std::fs::read_dir(&self.skills_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %self.skills_dir.display(), error = %e, "Failed to list skills");
                return Vec::new();
            }
        };

        let mut out: Vec<SkillInfo> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let skill_file = entry.path().join("SKILL.md");
                skill_file.is_file().then(|| SkillInfo {
                    name: entry.file_name().to_string_lossy().to_string(),
                    path: skill_file.to_string_lossy().to_string(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Load one skill by directory name.
    pub fn load_skill(&self, name: &str) -> Option<Skill> {
        if name.is_empty() || name == ".." || name.contains(['/', '\\']) {
            return None;
        }
        let path = self.skills_dir.join(name).join("SKILL.md");
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(skill = %name, error = %e, "Failed to read skill");
                return None;
            }
        };

        let (metadata, content) = parse_frontmatter(&raw);
        Some(Skill {
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
            metadata,
            content,
        })
    }

    /// Names of skills marked `load: always`.
    pub fn get_always_skills(&self) -> Vec<String> {
        self.list_skills()
            .into_iter()
            .filter_map(|info| self.load_skill(&info.name))
            .filter(Skill::is_always)
            .map(|skill| skill.name)
            .collect()
    }

    /// Full bodies of the named skills as prompt sections. Unknown names are
    /// skipped.
    pub fn load_skills_for_context(&self, names: &[String]) -> String {
        names
            .iter()
            .filter_map(|name| self.load_skill(name))
            .map(|skill| format!("## Skill: {}\n{}", skill.display_name(), skill.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One line per skill for the prompt; empty when there are no skills.
    pub fn build_skills_summary(&self) -> String {
        let lines: Vec<String> = self
            .list_skills()
            .into_iter()
            .filter_map(|info| self.load_skill(&info.name))
            .map(|skill| format!("- **{}**: {}", skill.name, skill.description()))
            .collect();
        if lines.is_empty() {
            return String::new();
        }
        format!("## Available Skills\n{}", lines.join("\n"))
    }
}

/// Split a leading `---` block from the markdown body.
fn parse_frontmatter(content: &str) -> (SkillMetadata, String) {
    let re = Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---\r?\n?").ok();
    if let Some(re) = re {
        if let Some(captures) = re.captures(content) {
            if let (Some(frontmatter), Some(full)) = (captures.get(1), captures.get(0)) {
                let metadata = parse_frontmatter_metadata(frontmatter.as_str());
                let body = content[full.end()..].trim().to_string();
                return (metadata, body);
            }
        }
    }

    (SkillMetadata::default(), content.to_string())
}

fn parse_frontmatter_metadata(frontmatter: &str) -> SkillMetadata {
    match serde_yaml::from_str::<SkillMetadata>(frontmatter) {
        Ok(meta) => meta,
        Err(e) => {
            warn!(error = %e, "Failed to parse skill frontmatter");
            SkillMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_skill(dir: &TempDir, name: &str, body: &str) {
        let skill_dir = dir.path().join(SKILLS_DIR).join(name);
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), body).unwrap();
    }

    #[test]
    fn test_parse_frontmatter() {
        let content = "---\nname: blink\ndescription: Toggle the status LED\nload: always\n---\n# Blink\n\nUse pin 2.\n";
        let (meta, body) = parse_frontmatter(content);
        assert_eq!(meta.name, "blink");
        assert_eq!(meta.description, "Toggle the status LED");
        assert_eq!(meta.load.as_deref(), Some("always"));
        assert_eq!(body, "# Blink\n\nUse pin 2.");
    }

    #[test]
    fn test_parse_frontmatter_without_frontmatter() {
        let content = "# Just markdown";
        let (meta, body) = parse_frontmatter(content);
        assert!(meta.name.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_unterminated_frontmatter_is_body() {
        let content = "---\nname: broken\n# never closed";
        let (meta, body) = parse_frontmatter(content);
        assert!(meta.name.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_list_skips_dirs_without_skill_file() {
        let dir = TempDir::new().unwrap();
        write_skill(&dir, "weather", "---\ndescription: Forecasts\n---\nUse wttr.in");
        write_skill(&dir, "blink", "Blink body");
        std::fs::create_dir_all(dir.path().join(SKILLS_DIR).join("empty")).unwrap();

        let loader = SkillsLoader::for_workspace(dir.path());
        let names: Vec<String> = loader.list_skills().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["blink", "weather"]);
    }

    #[test]
    fn test_missing_skills_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let loader = SkillsLoader::for_workspace(dir.path());
        assert!(loader.list_skills().is_empty());
        assert!(loader.build_skills_summary().is_empty());
        assert!(loader.load_skill("anything").is_none());
    }

    #[test]
    fn test_load_skill_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("SKILL.md"), "outside").unwrap();
        let loader = SkillsLoader::for_workspace(dir.path());
        assert!(loader.load_skill("..").is_none());
        assert!(loader.load_skill("../skills").is_none());
    }

    #[test]
    fn test_always_skills_and_context() {
        let dir = TempDir::new().unwrap();
        write_skill(
            &dir,
            "gpio",
            "---\nname: GPIO Basics\nload: always\n---\nPins 2 and 4 are outputs.",
        );
        write_skill(&dir, "relay", "---\nalways: true\n---\nRelay is active low.");
        write_skill(&dir, "weather", "---\ndescription: Forecasts\n---\nUse wttr.in");

        let loader = SkillsLoader::for_workspace(dir.path());
        let always = loader.get_always_skills();
        assert_eq!(always, vec!["gpio", "relay"]);

        let context = loader.load_skills_for_context(&always);
        assert_eq!(
            context,
            "## Skill: GPIO Basics\nPins 2 and 4 are outputs.\n\n## Skill: relay\nRelay is active low."
        );
    }

    #[test]
    fn test_skills_summary() {
        let dir = TempDir::new().unwrap();
        write_skill(&dir, "weather", "---\ndescription: Forecasts\n---\nUse wttr.in");
        write_skill(&dir, "blink", "No frontmatter here");

        let summary = SkillsLoader::for_workspace(dir.path()).build_skills_summary();
        assert_eq!(
            summary,
            "## Available Skills\n- **blink**: No description\n- **weather**: Forecasts"
        );
    }

    #[test]
    fn test_bad_yaml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        write_skill(&dir, "odd", "---\nname: [unclosed\n---\nBody stays.");

        let skill = SkillsLoader::for_workspace(dir.path()).load_skill("odd").unwrap();
        assert_eq!(skill.display_name(), "odd");
        assert_eq!(skill.content, "Body stays.");
        assert!(!skill.is_always());
    }
}
