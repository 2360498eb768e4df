//! General HTTP request tool, the model's stand-in for `curl`.
//!
//! Unlike `http_fetch` it takes a method, headers and a body, and it reports
//! the status line and response headers along with the (truncated) body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

use crate::error::{ChipClawError, Result};
use crate::utils::string::truncate_string;

use super::http_fetch::{parse_url, MAX_FETCH_CHARS};
use super::{Tool, ToolContext};

const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];

const CURL_USER_AGENT: &str = concat!("chipclaw/", env!("CARGO_PKG_VERSION"));

pub struct CurlTool {
    client: Client,
}

impl CurlTool {
    pub fn new() -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .user_agent(CURL_USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for CurlTool {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET` when absent; otherwise one of [`SUPPORTED_METHODS`], any case.
fn parse_method(raw: Option<&str>) -> Result<Method> {
    let method = raw.map(str::trim).unwrap_or("GET").to_uppercase();
    if !SUPPORTED_METHODS.contains(&method.as_str()) {
        return Err(ChipClawError::Tool(format!(
            "Unsupported HTTP method: {}",
            method
        )));
    }
    Method::from_bytes(method.as_bytes())
        .map_err(|_| ChipClawError::Tool(format!("Unsupported HTTP method: {}", method)))
}

/// Status line, one `name: value` line per header, a blank line, the body.
fn format_response(status: StatusCode, headers: &HeaderMap, body: &str) -> String {
    let mut lines = vec![format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string()];
    for (name, value) in headers {
        lines.push(format!(
            "{}: {}",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    lines.push(String::new());
    lines.push(truncate_string(body, MAX_FETCH_CHARS));
    lines.join("\n")
}

#[async_trait]
impl Tool for CurlTool {
    fn name(&self) -> &str {
        "curl"
    }

    fn description(&self) -> &str {
        "Perform HTTP requests (like curl). Supports GET, POST, PUT, DELETE, PATCH with custom headers and a body."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Request URL"
                },
                "method": {
                    "type": "string",
                    "enum": SUPPORTED_METHODS,
                    "description": "HTTP method (default: GET)"
                },
                "headers": {
                    "type": "object",
                    "description": "HTTP headers as key-value pairs",
                    "additionalProperties": { "type": "string" }
                },
                "data": {
                    "type": "string",
                    "description": "Request body. For JSON, pass a JSON-encoded string."
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
        let method = parse_method(args.get("method").and_then(|v| v.as_str()))?;

        let mut request = self.client.request(method, url);
        let headers = args.get("headers").and_then(|v| v.as_object());
        if let Some(headers) = headers {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        if let Some(data) = args.get("data").and_then(|v| v.as_str()) {
            let caller_set_ct = headers
                .map(|h| h.keys().any(|k| k.eq_ignore_ascii_case("content-type")))
                .unwrap_or(false);
            let trimmed = data.trim_start();
            if !caller_set_ct && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
                request = request.header("Content-Type", "application/json");
            }
            request = request.body(data.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;
        Ok(format_response(status, &response_headers, &body))
    }
}
