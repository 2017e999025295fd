//! Delivery of a single notification to the native layer
//!
//! Delivery is inert when the native capability is unavailable. On a
//! successful native call, the notification's redirect (if any) is queued
//! for the next focus-regain.

use std::sync::Arc;

use crate::errors::Result;
use crate::notification::Notification;
use crate::notify::Notifier;
use crate::state::SharedState;

/// What happened to one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Native capability absent; nothing shown, nothing queued
    Unavailable,
    /// Shown natively
    Shown { redirect_queued: bool },
}

pub struct NotificationSink<N> {
    notifier: N,
    state: Arc<SharedState>,
    defer_only_when_unfocused: bool,
}

impl<N: Notifier> NotificationSink<N> {
    pub fn new(notifier: N, state: Arc<SharedState>, defer_only_when_unfocused: bool) -> Self {
        Self {
            notifier,
            state,
            defer_only_when_unfocused,
        }
    }

    /// Show one notification; queue its redirect only after the native call succeeds
    pub async fn deliver(&self, notification: &Notification) -> Result<DeliveryOutcome> {
        if !self.notifier.is_available() {
            tracing::debug!("Native notifications unavailable, skipping delivery");
            return Ok(DeliveryOutcome::Unavailable);
        }

        self.notifier
            .show(&notification.title, &notification.body)
            .await?;

        let Some(target) = &notification.redirect else {
            return Ok(DeliveryOutcome::Shown {
                redirect_queued: false,
            });
        };

        if self.defer_only_when_unfocused && self.state.is_focused() {
            tracing::debug!(target = %target, "App focused, not deferring redirect");
            return Ok(DeliveryOutcome::Shown {
                redirect_queued: false,
            });
        }

        let pending = {
            let mut redirects = self.state.redirects.lock().await;
            redirects.push(target.clone());
            redirects.len()
        };
        tracing::debug!(target = %target, pending, "Redirect queued until focus");

        Ok(DeliveryOutcome::Shown {
            redirect_queued: true,
        })
    }
}
