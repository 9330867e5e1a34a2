//! Binding of `webclient.http.*` settings from flat properties, files and
//! the environment.
//!
//! Keys are matched after lower-casing and dropping `-` and `_`, so
//! `webclient.http.retry.max-retries` and `webclient.http.retry.maxRetries`
//! bind to the same field. Keys outside the prefix are ignored; unknown keys
//! under it are rejected.

use crate::config::HttpClientConfig;
use crate::{HttpClientError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Prefix shared by every client setting.
pub const PREFIX: &str = "webclient.http.";

/// Prefix of client settings in the environment.
pub const ENV_PREFIX: &str = "WEBCLIENT_HTTP_";

/// Bind flat `webclient.http.*` properties onto the defaults.
pub fn from_properties<I, K, V>(properties: I) -> Result<HttpClientConfig>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut config = HttpClientConfig::default();
    for (key, value) in properties {
        let key = key.as_ref().trim();
        if let Some(path) = strip_prefix(key) {
            apply(&mut config, key, &path, value.as_ref().trim())?;
        }
    }
    config.validate()?;
    Ok(config)
}

/// Parse `key=value` / `key: value` lines. `#` and `!` start comments.
pub fn parse_properties(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            let value = value[1..].trim().trim_matches('"').trim_matches('\'');
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Load the configuration from a `.properties`, `.toml` or `.json` file.
pub fn from_file(path: impl AsRef<Path>) -> Result<HttpClientConfig> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| HttpClientError::Config(format!("No file extension: {}", path.display())))?;

    let content = fs::read_to_string(path).map_err(|e| {
        HttpClientError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    match ext.as_str() {
        "properties" | "env" => from_properties(parse_properties(&content)),
        "toml" => {
            let value: toml::Value = toml::from_str(&content)
                .map_err(|e| HttpClientError::Config(format!("TOML parse error: {}", e)))?;
            let json = serde_json::to_value(value)
                .map_err(|e| HttpClientError::Config(format!("TOML conversion error: {}", e)))?;
            from_document(json)
        }
        "json" => {
            let json: Value = serde_json::from_str(&content)
                .map_err(|e| HttpClientError::Config(format!("JSON parse error: {}", e)))?;
            from_document(json)
        }
        other => Err(HttpClientError::Config(format!("Unsupported format: {}", other))),
    }
}

/// Deserialize a structured document. Accepts either the bare settings or
/// settings nested under `webclient.http`.
pub fn from_document(document: Value) -> Result<HttpClientConfig> {
    let settings = match document.pointer("/webclient/http") {
        Some(nested) => nested.clone(),
        None => document,
    };
    let config: HttpClientConfig = serde_json::from_value(settings)
        .map_err(|e| HttpClientError::Config(format!("Invalid client settings: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Bind `WEBCLIENT_HTTP_*` variables from the process environment.
pub fn from_env() -> Result<HttpClientConfig> {
    from_env_vars(std::env::vars())
}

/// Bind `WEBCLIENT_HTTP_<SECTION>_<FIELD>` variables,
/// e.g. `WEBCLIENT_HTTP_RETRY_MAX_RETRIES=5`.
pub fn from_env_vars<I>(vars: I) -> Result<HttpClientConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let properties = vars.into_iter().filter_map(|(key, value)| {
        let rest = key.strip_prefix(ENV_PREFIX)?;
        let (section, field) = rest.split_once('_')?;
        Some((
            format!("{}{}.{}", PREFIX, section.to_ascii_lowercase(), field),
            value,
        ))
    });
    from_properties(properties)
}

fn strip_prefix(key: &str) -> Option<String> {
    let lower = key.to_ascii_lowercase();
    lower
        .strip_prefix(PREFIX)
        .map(|rest| rest.replace(['-', '_'], ""))
}

fn apply(config: &mut HttpClientConfig, key: &str, path: &str, value: &str) -> Result<()> {
    let ssl = &mut config.ssl;
    match path {
        "ssl.enabled" => ssl.enabled = parse(key, value)?,
        "ssl.bypassverification" => ssl.bypass_verification = parse(key, value)?,
        "ssl.tlsprotocol" => ssl.tls_protocol = value.to_string(),
        "ssl.keystorepath" => ssl.keystore_path = optional(value),
        "ssl.keystorepassword" => ssl.keystore_password = Some(value.to_string()),
        "ssl.keystoretype" => ssl.keystore_type = value.to_string(),
        "ssl.truststorepath" => ssl.truststore_path = optional(value),
        "ssl.truststorepassword" => ssl.truststore_password = Some(value.to_string()),
        "ssl.truststoretype" => ssl.truststore_type = value.to_string(),
        "ssl.keyaliasname" => ssl.key_alias_name = optional(value),
        "pool.maxconnections" => config.pool.max_connections = parse(key, value)?,
        "pool.maxconnectionsperroute" => {
            config.pool.max_connections_per_route = parse(key, value)?
        }
        "timeout.connectrequesttimeoutms" => {
            config.timeout.connect_request_timeout_ms = parse(key, value)?
        }
        "timeout.timeoutms" => config.timeout.timeout_ms = parse(key, value)?,
        "retry.maxretries" => config.retry.max_retries = parse(key, value)?,
        "retry.retryintervalms" => config.retry.retry_interval_ms = parse(key, value)?,
        "response.acceptall2xx" => config.response.accept_all_2xx = parse(key, value)?,
        _ => {
            return Err(HttpClientError::Config(format!(
                "Unknown client setting: {}",
                key
            )));
        }
    }
    Ok(())
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| HttpClientError::Config(format!("Invalid value '{}' for {}: {}", value, key, e)))
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
