//! Focus watcher: surfaces deferred redirects when the app comes back
//!
//! Listens for focus-transition signals from the host (control socket) and
//! the terminal (focus reporting). A window focus gain or a visibility change
//! to visible drains exactly one redirect, newest first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::redirect::Navigator;
use crate::state::SharedState;
use crate::telemetry::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Focus transitions reported by the host or the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSignal {
    WindowFocused,
    WindowBlurred,
    Visibility(Visibility),
}

impl FocusSignal {
    /// Whether this transition should surface a pending redirect
    pub fn regains_focus(self) -> bool {
        matches!(
            self,
            Self::WindowFocused | Self::Visibility(Visibility::Visible)
        )
    }
}

pub struct FocusWatcher<V> {
    state: Arc<SharedState>,
    navigator: V,
}

impl<V: Navigator> FocusWatcher<V> {
    pub fn new(state: Arc<SharedState>, navigator: V) -> Self {
        Self { state, navigator }
    }

    /// Apply one signal. Returns the redirect target that was drained, if any.
    pub async fn handle(&self, signal: FocusSignal) -> Option<String> {
        match signal {
            FocusSignal::WindowFocused | FocusSignal::Visibility(Visibility::Visible) => {
                self.state.set_focused(true);
            }
            FocusSignal::WindowBlurred | FocusSignal::Visibility(Visibility::Hidden) => {
                self.state.set_focused(false);
            }
        }

        if signal.regains_focus() {
            self.drain_one().await
        } else {
            None
        }
    }

    /// Pop the newest redirect and navigate to it. Empty queue: nothing happens.
    pub async fn drain_one(&self) -> Option<String> {
        let target = self.state.redirects.lock().await.pop_latest()?;

        match self.navigator.navigate(&target) {
            Ok(()) => {
                metrics::record_redirect_opened();
                tracing::info!(target = %target, "Opened deferred redirect");
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Dropping redirect that could not be opened");
            }
        }
        Some(target)
    }

    /// Consume signals until the channel closes or `cancel` fires
    pub async fn run(self, mut signals: mpsc::Receiver<FocusSignal>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Focus watcher cancelled");
                    break;
                }
                signal = signals.recv() => {
                    let Some(signal) = signal else { break };
                    tracing::debug!(?signal, "Focus signal");
                    self.handle(signal).await;
                }
            }
        }
    }
}
