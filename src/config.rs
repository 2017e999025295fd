use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::HeraldError;

/// Backend base URL used when neither config nor CLI provides one
pub const DEFAULT_BASE_URL: &str = "https://xqgk-qz19-wyoe.p7.xano.io/api:2H_0O_Xw";

/// Application configuration loaded from file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeraldConfig {
    /// Backend notification listing
    #[serde(default)]
    pub backend: BackendConfig,

    /// Poll loop timing
    #[serde(default)]
    pub poll: PollConfig,

    /// Native notification delivery
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Deferred redirect handling
    #[serde(default)]
    pub redirects: RedirectConfig,
}

/// Backend-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; `/notifications?user_id=<id>` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on a single fetch, so slow responses can't overlap cycles
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_fetch_timeout() -> u64 {
    8
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    10
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Master switch for the native notification capability
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Application name shown by the notification server
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Display timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,

    /// Only queue a redirect when the app is unfocused at delivery time
    #[serde(default)]
    pub defer_only_when_unfocused: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: default_app_name(),
            timeout_ms: default_timeout_ms(),
            defer_only_when_unfocused: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "Herald".to_string()
}

fn default_timeout_ms() -> u32 {
    5000
}

/// Redirect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Base URL that relative redirect targets resolve against
    #[serde(default)]
    pub app_url: Option<String>,

    /// URL schemes the opener may be handed
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            app_url: None,
            allowed_schemes: default_schemes(),
        }
    }
}

fn default_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string(), "mailto".to_string()]
}

impl HeraldConfig {
    /// Load configuration from default path (~/.config/herald/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Get the default configuration path
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from("~/.config/herald/config.toml"),
            |dirs| dirs.config_dir().join("herald").join("config.toml"),
        )
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Reject values the poll loop can't run with
    pub fn validate(&self) -> Result<(), HeraldError> {
        if self.poll.interval_secs == 0 {
            return Err(HeraldError::Config(
                "poll.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.backend.fetch_timeout_secs == 0 {
            return Err(HeraldError::Config(
                "backend.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.backend.base_url).map_err(|e| {
            HeraldError::Config(format!(
                "backend.base_url '{}' is not a URL: {e}",
                self.backend.base_url
            ))
        })?;
        if let Some(app_url) = &self.redirects.app_url {
            url::Url::parse(app_url).map_err(|e| {
                HeraldError::Config(format!("redirects.app_url '{app_url}' is not a URL: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.fetch_timeout_secs)
    }

    /// Generate example configuration file content
    pub fn example() -> String {
        format!(
            r#"# Herald Configuration
# Place this file at ~/.config/herald/config.toml

[backend]
# Notifications are read from <base_url>/notifications?user_id=<id>
base_url = "{DEFAULT_BASE_URL}"

# Give up on a fetch after this many seconds
fetch_timeout_secs = 8

[poll]
# Seconds between poll cycles
interval_secs = 10

[notifications]
# Disable to run without native notifications (deliveries become no-ops)
enabled = true
app_name = "Herald"
timeout_ms = 5000

# Only queue a redirect when the app is not focused at delivery time
defer_only_when_unfocused = false

[redirects]
# Relative redirect targets (e.g. "/inbox/12") resolve against this URL.
# Without it they cannot be opened and are dropped.
# app_url = "https://app.example.com/"

allowed_schemes = ["http", "https", "mailto"]
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HeraldConfig::default();
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
        assert!(config.notifications.enabled);
        assert!(!config.notifications.defer_only_when_unfocused);
        assert_eq!(config.redirects.allowed_schemes.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = HeraldConfig::load_from_path(temp.path().join("nope.toml"));
        assert_eq!(config.poll.interval_secs, 10);
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[poll]\ninterval_secs = 30\n\n[notifications]\ndefer_only_when_unfocused = true\n",
        )
        .unwrap();

        let config = HeraldConfig::load_from_path(path);
        assert_eq!(config.poll.interval_secs, 30);
        assert!(config.notifications.defer_only_when_unfocused);
        assert_eq!(config.notifications.timeout_ms, 5000);
        assert_eq!(config.backend.fetch_timeout_secs, 8);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[poll\ninterval_secs = ").unwrap();

        let config = HeraldConfig::load_from_path(path);
        assert_eq!(config.poll.interval_secs, 10);
    }

    #[test]
    fn test_example_parses() {
        let config: HeraldConfig = toml::from_str(&HeraldConfig::example()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.redirects.app_url, None);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = HeraldConfig::default();
        config.poll.interval_secs = 0;
        assert_eq!(config.validate().unwrap_err().kind(), "config");
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = HeraldConfig::default();
        config.backend.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
