//! HTTP GET tool.
//!
//! Fetches a URL and hands the (truncated) body back to the model. A non-2xx
//! status is reported as a normal result, not an error, so the model can
//! react to it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};

use crate::error::{ChipClawError, Result};
use crate::utils::string::truncate_string;

use super::{Tool, ToolContext};

/// Largest response body returned to the model, in characters.
pub const MAX_FETCH_CHARS: usize = 4096;

const FETCH_USER_AGENT: &str = concat!("chipclaw/", env!("CARGO_PKG_VERSION"));

pub struct HttpFetchTool {
    client: Client,
}

impl HttpFetchTool {
    pub fn new() -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .user_agent(FETCH_USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for HttpFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts only absolute http/https URLs.
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|e| ChipClawError::Tool(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ChipClawError::Tool(format!(
            "Unsupported URL scheme '{}': only http/https are allowed",
            other
        ))),
    }
}

#[async_trait]
impl Tool for HttpFetchTool {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL via HTTP GET"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let raw = args
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChipClawError::Tool("Missing 'url' parameter".to_string()))?;
        let url = parse_url(raw)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(format!("HTTP {}", status));
        }

        let body = response.text().await?;
        Ok(truncate_string(&body, MAX_FETCH_CHARS))
    }
}
