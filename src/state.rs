//! Shared context for the poll, focus and control tasks
//!
//! Built once at startup and handed around as `Arc<SharedState>`. All
//! mutation of the identity/dedupe state and the redirect queue goes through
//! the mutexes here; guards are never held across an await on I/O.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::HeraldError;
use crate::identity::{IdentityContext, SubjectId};
use crate::redirect::RedirectQueue;

#[derive(Debug, Default)]
pub struct SharedState {
    pub identity: Mutex<IdentityContext>,
    pub redirects: Mutex<RedirectQueue>,
    focused: AtomicBool,
}

/// Snapshot reported by the `status` command
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub subject: Option<SubjectId>,
    pub seen: usize,
    pub pending_redirects: usize,
    pub focused: bool,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subject from host input. Invalid input is logged and ignored.
    pub async fn set_subject(&self, value: &Value) -> Result<SubjectId, HeraldError> {
        match SubjectId::from_value(value) {
            Ok(subject) => {
                self.set_subject_id(subject).await;
                Ok(subject)
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), input = %value, "Ignoring invalid subject");
                Err(e)
            }
        }
    }

    pub async fn set_subject_id(&self, subject: SubjectId) {
        let mut identity = self.identity.lock().await;
        if !identity.seen().is_empty() {
            tracing::debug!(dropped = identity.seen().len(), "Forgetting seen notification ids");
        }
        identity.set_subject(subject);
        drop(identity);
        tracing::info!(subject = %subject, "Subject set, dedupe state reset");
    }

    pub async fn clear_subject(&self) {
        self.identity.lock().await.clear_subject();
        tracing::info!("Subject cleared, dedupe state reset");
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::Relaxed)
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let (subject, seen) = {
            let identity = self.identity.lock().await;
            (identity.subject(), identity.seen().len())
        };
        let pending_redirects = self.redirects.lock().await.len();

        StateSnapshot {
            subject,
            seen,
            pending_redirects,
            focused: self.is_focused(),
        }
    }
}
