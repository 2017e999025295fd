//! Cross-platform native desktop notifications
//!
//! Uses notify-rust for native notifications on macOS, Linux, and BSD.
//! No external dependencies like terminal-notifier required.

use std::future::Future;

use notify_rust::{Notification as NativeNotification, Timeout};

use crate::config::NotificationConfig;
use crate::errors::{HeraldError, Result};

/// The host's native notification capability
pub trait Notifier: Send + Sync {
    /// False when not running somewhere notifications can be shown
    fn is_available(&self) -> bool;

    fn show(&self, title: &str, body: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Desktop notifications via notify-rust
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    enabled: bool,
    app_name: String,
    timeout_ms: u32,
}

impl DesktopNotifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            app_name: config.app_name.clone(),
            timeout_ms: config.timeout_ms,
        }
    }
}

/// Freedesktop notifications need a session bus
#[cfg(all(unix, not(target_os = "macos")))]
fn platform_available() -> bool {
    std::env::var_os("DBUS_SESSION_BUS_ADDRESS").is_some_and(|v| !v.is_empty())
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn platform_available() -> bool {
    true
}

impl Notifier for DesktopNotifier {
    fn is_available(&self) -> bool {
        self.enabled && platform_available()
    }

    async fn show(&self, title: &str, body: &str) -> Result<()> {
        let title = title.to_string();
        let body = body.to_string();
        let app_name = self.app_name.clone();
        let timeout = Timeout::Milliseconds(self.timeout_ms);

        // notify-rust blocks on the platform call; keep it off the runtime threads
        tokio::task::spawn_blocking(move || {
            NativeNotification::new()
                .appname(&app_name)
                .summary(&title)
                .body(&body)
                .timeout(timeout)
                .show()
                .map(|_| ())
                .map_err(|e| HeraldError::Delivery(e.to_string()))
        })
        .await
        .map_err(|e| HeraldError::Delivery(format!("notification task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_notifier_is_unavailable() {
        let config = NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        };
        assert!(!DesktopNotifier::new(&config).is_available());
    }

    #[test]
    fn test_default_identity_is_herald() {
        let notifier = DesktopNotifier::new(&NotificationConfig::default());
        assert_eq!(notifier.app_name, "Herald");
    }

    #[test]
    fn test_notifier_takes_config() {
        let config = NotificationConfig {
            app_name: "Inbox".to_string(),
            timeout_ms: 1500,
            ..NotificationConfig::default()
        };
        let notifier = DesktopNotifier::new(&config);
        assert_eq!(notifier.app_name, "Inbox");
        assert_eq!(notifier.timeout_ms, 1500);
    }
}
