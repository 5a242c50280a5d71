use std::path::Path;
use reqwest::Url;
use tracing::{debug, warn};
use crate::errors::ClientError;
use super::types::ClientConfig;

pub const ENV_API_BASE_URL: &str = "SCANBOARD_API_BASE_URL";
pub const ENV_STALE_TIME_MS: &str = "SCANBOARD_STALE_TIME_MS";
pub const ENV_GC_TIME_MS: &str = "SCANBOARD_GC_TIME_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "SCANBOARD_POLL_INTERVAL_MS";

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<ClientConfig, ClientError> {
    if !path.exists() {
        return Err(ClientError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ClientError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: ClientConfig = if content.trim().is_empty() {
        ClientConfig::default()
    } else {
        serde_yaml::from_str(&content)?
    };

    validate_config(&config)?;
    debug!(path = %path.display(), base_url = %config.api_base_url, "Loaded client config");
    Ok(config)
}

/// Defaults overlaid with `SCANBOARD_*` environment variables.
pub fn config_from_env() -> Result<ClientConfig, ClientError> {
    let mut config = ClientConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Overlay environment values onto `config`. The lookup is injected so the
/// overlay can be exercised without touching the process environment.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ClientError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
        config.api_base_url = url.trim().to_string();
    }
    if let Some(ms) = lookup(ENV_STALE_TIME_MS) {
        config.stale_time_ms = parse_millis(ENV_STALE_TIME_MS, &ms)?;
    }
    if let Some(ms) = lookup(ENV_GC_TIME_MS) {
        config.gc_time_ms = parse_millis(ENV_GC_TIME_MS, &ms)?;
    }
    if let Some(ms) = lookup(ENV_POLL_INTERVAL_MS) {
        config.poll_interval_ms = parse_millis(ENV_POLL_INTERVAL_MS, &ms)?;
    }
    validate_config(config)
}

fn parse_millis(name: &str, raw: &str) -> Result<u64, ClientError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ClientError::Config(format!("{} must be a whole number of milliseconds, got '{}'", name, raw)))
}

/// Reject settings the synchronization layer cannot run with.
pub fn validate_config(config: &ClientConfig) -> Result<(), ClientError> {
    let url = Url::parse(&config.api_base_url)
        .map_err(|e| ClientError::Config(format!("Invalid api_base_url '{}': {}", config.api_base_url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ClientError::Config(format!(
            "api_base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.poll_interval_ms == 0 {
        return Err(ClientError::Config("poll_interval_ms must be greater than zero".into()));
    }

    if config.stale_time_ms > config.gc_time_ms {
        warn!(
            stale_time_ms = config.stale_time_ms,
            gc_time_ms = config.gc_time_ms,
            "Unreferenced entries will be evicted before they go stale"
        );
    }

    Ok(())
}
