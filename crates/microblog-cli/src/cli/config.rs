use std::path::{Path, PathBuf};

use anyhow::Result;
use microblog_core::ClientConfig;

/// `<config dir>/microblog/config.json`, when the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("microblog").join("config.json"))
}

/// Pick the config: an explicit `--config` file must load; otherwise the
/// default file is used if it exists, else built-in defaults. Environment
/// overrides apply last.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ClientConfig> {
    resolve_config_from(explicit, default_config_path().as_deref())
}

fn resolve_config_from(explicit: Option<&Path>, fallback: Option<&Path>) -> Result<ClientConfig> {
    let config = match (explicit, fallback) {
        (Some(path), _) => ClientConfig::load(path)?,
        (None, Some(path)) if path.exists() => ClientConfig::load(path)?,
        _ => ClientConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_wins() {
        let mut explicit = tempfile::NamedTempFile::new().unwrap();
        write!(explicit, r#"{{"timelinePageSize": 7}}"#).unwrap();
        let mut fallback = tempfile::NamedTempFile::new().unwrap();
        write!(fallback, r#"{{"timelinePageSize": 9}}"#).unwrap();

        let config = resolve_config_from(Some(explicit.path()), Some(fallback.path())).unwrap();
        assert_eq!(config.timeline_page_size, 7);
    }

    #[test]
    fn test_fallback_used_when_present() {
        let mut fallback = tempfile::NamedTempFile::new().unwrap();
        write!(fallback, r#"{{"notificationPageSize": 10}}"#).unwrap();

        let config = resolve_config_from(None, Some(fallback.path())).unwrap();
        assert_eq!(config.notification_page_size, 10);
    }

    #[test]
    fn test_missing_fallback_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.json");

        let config = resolve_config_from(None, Some(&missing)).unwrap();
        assert_eq!(config.timeline_page_size, ClientConfig::default().timeline_page_size);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let err = resolve_config_from(Some(&missing), None).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
