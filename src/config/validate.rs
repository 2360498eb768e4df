//! Config file diagnostics with unknown field detection.
//!
//! Used by `chipclaw config check`. Serde silently ignores unknown keys, so a
//! typo such as `max_tool_iteration` would otherwise fall back to the default
//! without any hint.

use serde_json::Value;
use std::collections::HashSet;

use super::Config;

const KNOWN_TOP_LEVEL: &[&str] = &["agent", "provider", "channels", "logging"];

const KNOWN_AGENT: &[&str] = &[
    "workspace",
    "data_dir",
    "model",
    "max_tokens",
    "temperature",
    "max_tool_iterations",
    "max_session_messages",
    "bus_capacity",
];

const KNOWN_PROVIDER: &[&str] = &["api_key", "api_base"];

const KNOWN_CHANNELS: &[&str] = &["uart", "mqtt", "console"];

const KNOWN_LOGGING: &[&str] = &["level", "format", "file"];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Edit distance, used for "did you mean?" hints.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b_chars.len() + 1];
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        prev = row;
    }
    prev[b_chars.len()]
}

/// The closest known name within distance 3.
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn check_keys(section: &Value, path: &str, known: &[&str], out: &mut Vec<Diagnostic>) -> bool {
    let Some(obj) = section.as_object() else {
        return false;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut found_unknown = false;

    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        found_unknown = true;
        let full_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        let message = match suggest_field(key, known) {
            Some(hint) => format!("Unknown field '{}' ({})", key, hint),
            None => format!("Unknown field '{}'", key),
        };
        out.push(Diagnostic::new(DiagnosticLevel::Error, full_path, message));
    }
    found_unknown
}

/// Diagnose a raw config document: shape, unknown keys, value ranges, and
/// channels that accept anyone.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if !raw.is_object() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            "Config must be a JSON object",
        ));
        return diagnostics;
    }
    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let mut has_unknown = check_keys(raw, "", KNOWN_TOP_LEVEL, &mut diagnostics);
    let sections: [(&str, &[&str]); 4] = [
        ("agent", KNOWN_AGENT),
        ("provider", KNOWN_PROVIDER),
        ("channels", KNOWN_CHANNELS),
        ("logging", KNOWN_LOGGING),
    ];
    for (name, known) in sections {
        if let Some(section) = raw.get(name) {
            has_unknown |= check_keys(section, name, known, &mut diagnostics);
        }
    }
    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    match serde_json::from_value::<Config>(raw.clone()) {
        Ok(config) => {
            if let Err(e) = config.validate() {
                diagnostics.push(Diagnostic::new(DiagnosticLevel::Error, "", e.to_string()));
            }
        }
        Err(e) => diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            format!("Schema mismatch: {}", e),
        )),
    }

    if let Some(channels) = raw.get("channels").and_then(|v| v.as_object()) {
        for (name, channel) in channels {
            let enabled = channel
                .get("enabled")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let allowlist_len = channel
                .get("allowlist")
                .and_then(|v| v.as_array())
                .map(|a| a.len())
                .unwrap_or(0);
            if enabled && name != "console" && allowlist_len == 0 {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warn,
                    format!("channels.{}.allowlist", name),
                    "Empty: any sender can talk to the agent",
                ));
            }
        }
    }

    diagnostics
}

/// True when no diagnostic is an error.
pub fn is_clean(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .all(|d| d.level != DiagnosticLevel::Error)
}
