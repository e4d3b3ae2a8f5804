//! CLI output formatting.
//!
//! Formatters return lines so tests can assert on them; `print_*` wrappers
//! write to stdout. Secrets never appear in output.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Config
//!     Max output: 6291456 bytes
//!     Cache-Control: max-age=31536000
//! Source
//!     http https://images.example.com (timeout 10s)
//! Cache
//!     s3 transformed-images (us-east-1)
//!         Credentials: configured
//! ```
//!
//! ## Invoke
//!
//! ```text
//! 200 image/webp, 12034 bytes
//!     Server-Timing: fetch;dur=12.0, transform;dur=40.1, size-check;dur=0.0
//! ```

use crate::config::{CacheConfig, HandlerConfig, SourceConfig};
use crate::response::HttpResponse;

const INDENT: &str = "    ";

pub fn format_config_summary(config: &HandlerConfig) -> Vec<String> {
    let mut lines = vec![
        "Config".to_string(),
        format!("{INDENT}Max output: {} bytes", config.max_output_bytes),
        format!("{INDENT}Cache-Control: {}", config.cache_control),
        "Source".to_string(),
    ];

    lines.push(match &config.source {
        SourceConfig::Http { url, timeout_secs } => {
            format!("{INDENT}http {url} (timeout {timeout_secs}s)")
        }
        SourceConfig::Local { path } => format!("{INDENT}local {}", path.display()),
    });

    lines.push("Cache".to_string());
    match &config.cache {
        None => lines.push(format!("{INDENT}disabled")),
        Some(CacheConfig::Local { path }) => {
            lines.push(format!("{INDENT}local {}", path.display()));
        }
        Some(CacheConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            ..
        }) => {
            lines.push(format!("{INDENT}s3 {bucket} ({region})"));
            if let Some(endpoint) = endpoint {
                lines.push(format!("{INDENT}{INDENT}Endpoint: {endpoint}"));
            }
            let credentials = if access_key_id.is_some() {
                "configured"
            } else {
                "none"
            };
            lines.push(format!("{INDENT}{INDENT}Credentials: {credentials}"));
        }
    }

    lines
}

pub fn print_config_summary(config: &HandlerConfig) {
    for line in format_config_summary(config) {
        println!("{}", line);
    }
}

/// One-line status plus the headers that matter when debugging by hand.
pub fn format_response_summary(response: &HttpResponse) -> Vec<String> {
    let mut lines = Vec::new();
    match response.status_code {
        200 => lines.push(format!(
            "200 {}, {} bytes",
            response.header("Content-Type").unwrap_or("?"),
            response.body_bytes().map(|b| b.len()).unwrap_or(0)
        )),
        302 => lines.push(format!(
            "302 → {}",
            response.header("Location").unwrap_or("?")
        )),
        status => lines.push(format!("{status} {}", response.body)),
    }
    if let Some(timing) = response.header("Server-Timing") {
        lines.push(format!("{INDENT}Server-Timing: {timing}"));
    }
    lines
}
