use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    API_BASE_URL_ENV_VARS, DEFAULT_API_BASE_URL, DEFAULT_NOTIFICATION_PAGE_SIZE,
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_TIMELINE_PAGE_SIZE,
    DEFAULT_UNREAD_POLL_INTERVAL_MS,
};

/// Client configuration, loadable from a JSON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash
    pub api_base_url: String,

    /// WebSocket URL for push events; push is disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    pub timeline_page_size: u32,
    pub notification_page_size: u32,
    pub unread_poll_interval_ms: u64,

    /// Periodic full timeline refresh; off unless set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_refresh_interval_ms: Option<u64>,

    pub reconnect_interval_ms: u64,
    pub reconnect_attempts: u32,

    /// Per-request timeout; requests may wait indefinitely when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            push_url: None,
            auth_token: None,
            timeline_page_size: DEFAULT_TIMELINE_PAGE_SIZE,
            notification_page_size: DEFAULT_NOTIFICATION_PAGE_SIZE,
            unread_poll_interval_ms: DEFAULT_UNREAD_POLL_INTERVAL_MS,
            feed_refresh_interval_ms: None,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            request_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config.normalized())
    }

    /// Deserialize config from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(json).context("Failed to deserialize config")?;
        Ok(config.normalized())
    }

    /// Apply the first non-empty base URL override found in the environment.
    pub fn with_env_overrides(mut self) -> Self {
        let from_env = API_BASE_URL_ENV_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty());
        if let Some(url) = from_env {
            self.api_base_url = url;
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn unread_poll_interval(&self) -> Duration {
        Duration::from_millis(self.unread_poll_interval_ms)
    }

    pub fn feed_refresh_interval(&self) -> Option<Duration> {
        self.feed_refresh_interval_ms.map(Duration::from_millis)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_minimal() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeline_page_size, 20);
        assert_eq!(config.notification_page_size, 50);
        assert_eq!(config.unread_poll_interval(), Duration::from_secs(30));
        assert_eq!(config.reconnect_interval(), Duration::from_secs(3));
        assert_eq!(config.reconnect_attempts, 5);
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_parse_config_trims_trailing_slash() {
        let json = r#"{
            "apiBaseUrl": "https://social.example/api/",
            "pushUrl": "wss://social.example/ws",
            "authToken": "secret",
            "reconnectAttempts": 2,
            "feedRefreshIntervalMs": 60000
        }"#;
        let config = ClientConfig::from_json(json).unwrap();
        assert_eq!(config.api_base_url, "https://social.example/api");
        assert_eq!(config.push_url.as_deref(), Some("wss://social.example/ws"));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.reconnect_attempts, 2);
        assert_eq!(config.feed_refresh_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"timelinePageSize": 5, "requestTimeoutMs": 1500}}"#).unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.timeline_page_size, 5);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_load_reports_path_on_parse_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
