//! Handler configuration.
//!
//! Built once at startup and borrowed by the pipeline. Three layers, later
//! layers overriding earlier ones key by key:
//!
//! 1. an empty base,
//! 2. an optional `config.toml`,
//! 3. `IMAGE_HANDLER_*` environment variables.
//!
//! ## Configuration Options
//!
//! ```toml
//! max_output_bytes = 6291456          # Required. Larger outputs redirect or 403
//! cache_control = "max-age=31536000"  # Cache-Control for served and cached objects
//!
//! [source]
//! type = "http"                       # or "local" with `path = "..."`
//! url = "https://images.example.com"
//! timeout_secs = 10
//!
//! [cache]                             # Optional. Without it nothing is cached
//! type = "s3"                         # or "local" with `path = "..."`
//! bucket = "transformed-images"
//! region = "us-east-1"
//! endpoint = "http://localhost:9000"  # S3-compatible services
//! ```
//!
//! A table whose `type` changes between layers is replaced, not merged:
//! `IMAGE_HANDLER_SOURCE_DIR` over an http source from the file yields a plain
//! local source without a stray `url`.
//!
//! Unknown keys are rejected to catch typos early.

use crate::size_guard::SizeGuard;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_PREFIX: &str = "IMAGE_HANDLER_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable {name}: {reason}")]
    Env { name: String, reason: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    /// Largest body returned inline, in bytes.
    pub max_output_bytes: u64,
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

fn default_cache_control() -> String {
    "max-age=31536000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Where source images are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum SourceConfig {
    Http {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Local {
        path: PathBuf,
    },
}

/// Where transformed images are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum CacheConfig {
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default)]
        session_token: Option<String>,
    },
    Local {
        path: PathBuf,
    },
}

impl HandlerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_output_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_output_bytes must be greater than 0".into(),
            ));
        }

        match &self.source {
            SourceConfig::Http { url, timeout_secs } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Validation(format!(
                        "source.url must start with http:// or https://, got {url:?}"
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(ConfigError::Validation(
                        "source.timeout_secs must be greater than 0".into(),
                    ));
                }
            }
            SourceConfig::Local { path } => require_path("source.path", path)?,
        }

        match &self.cache {
            Some(CacheConfig::S3 {
                bucket,
                region,
                access_key_id,
                secret_access_key,
                ..
            }) => {
                if bucket.trim().is_empty() {
                    return Err(ConfigError::Validation("cache.bucket must not be empty".into()));
                }
                if region.trim().is_empty() {
                    return Err(ConfigError::Validation("cache.region must not be empty".into()));
                }
                if access_key_id.is_some() != secret_access_key.is_some() {
                    return Err(ConfigError::Validation(
                        "cache.access_key_id and cache.secret_access_key must be set together"
                            .into(),
                    ));
                }
            }
            Some(CacheConfig::Local { path }) => require_path("cache.path", path)?,
            None => {}
        }

        Ok(())
    }

    pub fn size_guard(&self) -> SizeGuard {
        SizeGuard::new(self.max_output_bytes)
    }
}

fn require_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Tables whose `type` tags differ are not merged; the overlay wins whole.
/// - Non-table values in overlay replace base values entirely.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            if is_retagged(&base_table, &overlay_table) {
                return toml::Value::Table(overlay_table);
            }
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

fn is_retagged(base: &toml::Table, overlay: &toml::Table) -> bool {
    match (base.get("type"), overlay.get("type")) {
        (Some(old), Some(new)) => old != new,
        _ => false,
    }
}

/// Read a config file as a raw TOML value. The file must exist.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Translate environment variables into a TOML overlay.
///
/// Only `IMAGE_HANDLER_*` variables are considered; unknown ones are errors.
pub fn env_overlay<I>(vars: I) -> Result<toml::Value, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: BTreeMap<String, String> = vars
        .into_iter()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .collect();

    let mut root = toml::Table::new();
    let mut source = toml::Table::new();
    let mut cache = toml::Table::new();

    for (name, value) in &vars {
        let key = &name[ENV_PREFIX.len()..];
        match key {
            "SOURCE_URL" => {
                source.insert("type".into(), "http".into());
                source.insert("url".into(), value.clone().into());
            }
            "SOURCE_DIR" => {
                source.insert("type".into(), "local".into());
                source.insert("path".into(), value.clone().into());
            }
            "FETCH_TIMEOUT_SECS" => {
                source.insert("timeout_secs".into(), parse_int(name, value)?.into());
            }
            "CACHE_BUCKET" => {
                cache.insert("type".into(), "s3".into());
                cache.insert("bucket".into(), value.clone().into());
            }
            "CACHE_REGION" => {
                cache.insert("region".into(), value.clone().into());
            }
            "CACHE_ENDPOINT" => {
                cache.insert("endpoint".into(), value.clone().into());
            }
            "CACHE_DIR" => {
                cache.insert("type".into(), "local".into());
                cache.insert("path".into(), value.clone().into());
            }
            "CACHE_CONTROL" => {
                root.insert("cache_control".into(), value.clone().into());
            }
            "MAX_OUTPUT_BYTES" => {
                root.insert("max_output_bytes".into(), parse_int(name, value)?.into());
            }
            _ => {
                return Err(ConfigError::Env {
                    name: name.clone(),
                    reason: "unknown variable".into(),
                });
            }
        }
    }

    exclusive(&vars, "SOURCE_URL", "SOURCE_DIR")?;
    exclusive(&vars, "CACHE_BUCKET", "CACHE_DIR")?;

    if !source.is_empty() {
        root.insert("source".into(), toml::Value::Table(source));
    }
    if !cache.is_empty() {
        root.insert("cache".into(), toml::Value::Table(cache));
    }
    Ok(toml::Value::Table(root))
}

fn parse_int(name: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse::<i64>().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        reason: format!("expected an integer, got {value:?}"),
    })
}

fn exclusive(vars: &BTreeMap<String, String>, a: &str, b: &str) -> Result<(), ConfigError> {
    let has = |key: &str| vars.contains_key(&format!("{ENV_PREFIX}{key}"));
    if has(a) && has(b) {
        return Err(ConfigError::Env {
            name: format!("{ENV_PREFIX}{a}"),
            reason: format!("cannot be combined with {ENV_PREFIX}{b}"),
        });
    }
    Ok(())
}

/// Fill S3 credentials from the standard `AWS_*` variables when the merged
/// cache is S3.
fn apply_aws_credentials(merged: &mut toml::Value, vars: &BTreeMap<String, String>) {
    let Some(cache) = merged.get_mut("cache").and_then(toml::Value::as_table_mut) else {
        return;
    };
    if cache.get("type").and_then(toml::Value::as_str) != Some("s3") {
        return;
    }
    for (var, key) in [
        ("AWS_ACCESS_KEY_ID", "access_key_id"),
        ("AWS_SECRET_ACCESS_KEY", "secret_access_key"),
        ("AWS_SESSION_TOKEN", "session_token"),
    ] {
        if let Some(value) = vars.get(var) {
            cache.insert(key.into(), value.clone().into());
        }
    }
}

/// Deserialize a merged value and validate it.
pub fn resolve_config(merged: toml::Value) -> Result<HandlerConfig, ConfigError> {
    let config: HandlerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from an optional file plus environment variables.
///
/// Pass `std::env::vars()` in production; tests pass a fixed list.
pub fn load_config<I>(path: Option<&Path>, env: I) -> Result<HandlerConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: BTreeMap<String, String> = env.into_iter().collect();

    let mut merged = toml::Value::Table(toml::Table::new());
    if let Some(path) = path {
        merged = merge_toml(merged, load_raw_config(path)?);
    }
    merged = merge_toml(merged, env_overlay(vars.clone())?);
    apply_aws_credentials(&mut merged, &vars);

    resolve_config(merged)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Handler Configuration
# ===========================
# Every key can also be set through the environment; environment variables
# override this file. Unknown keys cause an error.

# Largest transformed image returned inline, in bytes. Larger results are
# written to the cache and answered with a redirect, or refused with 403 when
# no cache is configured.
# Env: IMAGE_HANDLER_MAX_OUTPUT_BYTES
max_output_bytes = 6291456

# Cache-Control sent with inline responses and stored with cached objects.
# Env: IMAGE_HANDLER_CACHE_CONTROL
cache_control = "max-age=31536000"

# ---------------------------------------------------------------------------
# Source images
# ---------------------------------------------------------------------------
[source]
# "http": GET <url>/<key>, spaces in the key sent as '+'.
# Env: IMAGE_HANDLER_SOURCE_URL
type = "http"
url = "https://images.example.com"

# Seconds before a source fetch is abandoned.
# Env: IMAGE_HANDLER_FETCH_TIMEOUT_SECS
timeout_secs = 10

# "local": read <path>/<key> from disk.
# Env: IMAGE_HANDLER_SOURCE_DIR
# type = "local"
# path = "./originals"

# ---------------------------------------------------------------------------
# Cache store (optional)
# ---------------------------------------------------------------------------
# Objects are written under "<source key>/<directive>".
#
# [cache]
# type = "s3"
# bucket = "transformed-images"       # Env: IMAGE_HANDLER_CACHE_BUCKET
# region = "us-east-1"                # Env: IMAGE_HANDLER_CACHE_REGION
# endpoint = "http://localhost:9000"  # Env: IMAGE_HANDLER_CACHE_ENDPOINT
# Credentials come from AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and
# AWS_SESSION_TOKEN, or from these keys:
# access_key_id = "..."
# secret_access_key = "..."
#
# [cache]
# type = "local"
# path = "./cache"                    # Env: IMAGE_HANDLER_CACHE_DIR
"##
}
