//! Deferred navigation targets
//!
//! Redirects attached to delivered notifications wait here until the
//! application regains focus. Draining pops the most recently queued target
//! first; older targets stay queued for later focus events. Entries never
//! expire and are never deduplicated.

use std::process::Command;

use url::Url;

use crate::errors::{HeraldError, Result};

/// Pending redirect targets, in delivery order
#[derive(Debug, Default)]
pub struct RedirectQueue {
    targets: Vec<String>,
}

impl RedirectQueue {
    pub fn push(&mut self, target: String) {
        self.targets.push(target);
    }

    /// Take the last-enqueued target (LIFO)
    pub fn pop_latest(&mut self) -> Option<String> {
        self.targets.pop()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Moves the application to a redirect target
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str) -> Result<()>;
}

/// Opens targets with the platform's URL opener.
///
/// Relative targets (`/inbox/12`) resolve against `app_url` when one is
/// configured, the way an in-app link would.
#[derive(Debug, Clone)]
pub struct SystemNavigator {
    app_url: Option<Url>,
    allowed_schemes: Vec<String>,
}

impl SystemNavigator {
    pub fn new(app_url: Option<Url>, allowed_schemes: &[String]) -> Self {
        Self {
            app_url,
            allowed_schemes: allowed_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether relative targets (`/inbox/12`) can be opened
    pub fn resolves_relative(&self) -> bool {
        self.app_url.is_some()
    }

    /// Parse and check the scheme before handing anything to a shell opener
    pub fn validate(&self, target: &str) -> Result<Url> {
        let fail = |reason: String| HeraldError::Navigation {
            target: target.to_string(),
            reason,
        };

        let trimmed = target.trim();
        let parsed = match (Url::parse(trimmed), &self.app_url) {
            (Ok(url), _) => url,
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => base
                .join(trimmed)
                .map_err(|e| fail(format!("invalid URL: {e}")))?,
            (Err(url::ParseError::RelativeUrlWithoutBase), None) => {
                return Err(fail(
                    "relative target needs redirects.app_url to be set".to_string(),
                ))
            }
            (Err(e), _) => return Err(fail(format!("invalid URL: {e}"))),
        };
        let scheme = parsed.scheme().to_ascii_lowercase();
        if !self.allowed_schemes.iter().any(|s| *s == scheme) {
            return Err(fail(format!("unsupported scheme: {scheme}")));
        }
        Ok(parsed)
    }
}

impl Navigator for SystemNavigator {
    fn navigate(&self, target: &str) -> Result<()> {
        let url = self.validate(target)?;

        #[cfg(target_os = "macos")]
        let spawned = Command::new("open").arg(url.as_str()).spawn();
        #[cfg(target_os = "windows")]
        let spawned = Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(url.as_str())
            .spawn();
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let spawned = Command::new("xdg-open").arg(url.as_str()).spawn();

        let mut child = spawned.map_err(|e| HeraldError::Navigation {
            target: target.to_string(),
            reason: format!("failed to launch opener: {e}"),
        })?;

        // Reap the opener off-thread so it doesn't linger as a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}
