//! Watcher configuration.

use std::path::PathBuf;
use std::time::Duration;

use nbgate_common::{COMMIT_TIMEOUT, INTERNAL_TOKEN_TIMEOUT, PortalConfig};

/// Watched file path.
pub const WATCH_FILE_VAR: &str = "WATCH_FILE";

/// URL of the gate server's token broker.
pub const AUTH_PROXY_URL_VAR: &str = "NBGATE_AUTH_PROXY_URL";

/// Default watched file.
pub const DEFAULT_WATCH_FILE: &str = "/app/main.py";

/// Default token broker URL.
pub const DEFAULT_AUTH_PROXY_URL: &str = "http://127.0.0.1:8082/internal-token";

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// File to watch.
    pub watch_file: PathBuf,
    /// Token broker URL.
    pub auth_proxy_url: String,
    /// Portal identifiers.
    pub portal: PortalConfig,
    /// Delay between two polls.
    pub poll_interval: Duration,
    /// Pause after an unexpected error in the polling loop.
    pub error_backoff: Duration,
    /// Timeout of the token broker call.
    pub token_timeout: Duration,
    /// Timeout of the commit call.
    pub commit_timeout: Duration,
    /// Upgrade plain `http` portal URLs to `https` for commits.
    pub force_https: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_file: PathBuf::from(DEFAULT_WATCH_FILE),
            auth_proxy_url: DEFAULT_AUTH_PROXY_URL.to_string(),
            portal: PortalConfig::default(),
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            token_timeout: INTERNAL_TOKEN_TIMEOUT,
            commit_timeout: COMMIT_TIMEOUT,
            force_https: true,
        }
    }
}

impl WatcherConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            portal: PortalConfig::from_lookup(&lookup),
            ..Self::default()
        };
        if let Some(path) = lookup(WATCH_FILE_VAR).filter(|p| !p.trim().is_empty()) {
            config.watch_file = PathBuf::from(path);
        }
        if let Some(url) = lookup(AUTH_PROXY_URL_VAR).filter(|u| !u.trim().is_empty()) {
            config.auth_proxy_url = url;
        }
        config
    }

    /// Commit endpoint for the watched file, or the first missing setting.
    ///
    /// Plain `http` portal URLs are upgraded unless `force_https` is off: the
    /// commit API is only served over TLS.
    pub fn commit_url(&self) -> Result<String, &'static str> {
        let api_url = self.portal.api_url().ok_or("Portal API")?;
        let workspace_id = self.portal.workspace_id().ok_or("Workspace ID")?;
        let application_id = self.portal.application_id().ok_or("Application ID")?;
        let file_name = self
            .watch_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("Watched file name")?;

        let api_url = match api_url.strip_prefix("http://") {
            Some(rest) if self.force_https => format!("https://{rest}"),
            _ => api_url.to_string(),
        };
        Ok(format!(
            "{api_url}/workspaces/{workspace_id}/files/{application_id}/{file_name}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbgate_common::{APPLICATION_ID_VAR, PORTAL_API_VAR, WORKSPACE_ID_VAR};

    fn configured(api_url: &str) -> WatcherConfig {
        WatcherConfig {
            watch_file: PathBuf::from("/app/main.py"),
            portal: PortalConfig {
                api_url: Some(api_url.to_string()),
                workspace_id: Some("ws-1".to_string()),
                application_id: Some("app-1".to_string()),
                deployment_id: None,
            },
            ..WatcherConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.watch_file, PathBuf::from("/app/main.py"));
        assert_eq!(config.auth_proxy_url, "http://127.0.0.1:8082/internal-token");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.error_backoff, Duration::from_secs(5));
        assert_eq!(config.token_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_commit_url() {
        let config = configured("https://portal.example.com/api/");
        assert_eq!(
            config.commit_url().unwrap(),
            "https://portal.example.com/api/workspaces/ws-1/files/app-1/main.py"
        );
    }

    #[test]
    fn test_commit_url_upgrades_plain_http() {
        let config = configured("http://portal.example.com");
        assert_eq!(
            config.commit_url().unwrap(),
            "https://portal.example.com/workspaces/ws-1/files/app-1/main.py"
        );
    }

    #[test]
    fn test_commit_url_keeps_http_when_not_forced() {
        let mut config = configured("http://127.0.0.1:8080");
        config.force_https = false;
        assert_eq!(
            config.commit_url().unwrap(),
            "http://127.0.0.1:8080/workspaces/ws-1/files/app-1/main.py"
        );
    }

    #[test]
    fn test_commit_url_reports_missing_setting() {
        let mut config = configured("https://portal.example.com");
        config.portal.application_id = None;
        assert_eq!(config.commit_url(), Err("Application ID"));

        config.portal.workspace_id = Some(String::new());
        assert_eq!(config.commit_url(), Err("Workspace ID"));
    }

    #[test]
    fn test_from_lookup() {
        let config = WatcherConfig::from_lookup(|key| match key {
            WATCH_FILE_VAR => Some("/data/notebook.py".to_string()),
            PORTAL_API_VAR => Some("https://portal.example.com".to_string()),
            WORKSPACE_ID_VAR => Some("ws-9".to_string()),
            APPLICATION_ID_VAR => Some("app-9".to_string()),
            _ => None,
        });
        assert_eq!(config.watch_file, PathBuf::from("/data/notebook.py"));
        assert_eq!(config.auth_proxy_url, DEFAULT_AUTH_PROXY_URL);
        assert_eq!(
            config.commit_url().unwrap(),
            "https://portal.example.com/workspaces/ws-9/files/app-9/notebook.py"
        );
    }
}
