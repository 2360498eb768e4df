//! Config show/check command handlers.

use std::path::Path;

use anyhow::{Context, Result};

use chipclaw::config::validate::{validate_config, DiagnosticLevel};
use chipclaw::config::Config;

use super::common::mask_secret;
use super::ConfigAction;

pub(crate) fn cmd_config(config_path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut config = Config::load_from_path(config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?;
            config.provider.api_key = mask_secret(&config.provider.api_key);
            if let Some(password) = config.channels.mqtt.password.as_mut() {
                *password = mask_secret(password);
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Check => {
            println!("Config file: {}", config_path.display());

            if !config_path.exists() {
                println!("[OK] No config file found (using defaults)");
                return Ok(());
            }

            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;

            let raw: serde_json::Value = match serde_json::from_str(&content) {
                Ok(v) => v,
                Err(e) => {
                    println!("[ERROR] Invalid JSON: {}", e);
                    return Ok(());
                }
            };

            let diagnostics = validate_config(&raw);
            for diag in &diagnostics {
                println!("{}", diag);
            }

            let errors = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Error)
                .count();
            let warnings = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Warn)
                .count();

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
        }
    }
    Ok(())
}
