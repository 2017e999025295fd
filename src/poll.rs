//! Poll loop: fetch → dedupe → deliver → record seen
//!
//! Runs as a tokio task on a fixed period, first cycle immediately. The
//! same cycle is callable on demand through the control socket's `poll`
//! command. Cycles are serialized by a run guard, and every failure is
//! logged and swallowed so the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::identity::SubjectId;
use crate::notification::Notification;
use crate::notify::Notifier;
use crate::sink::{DeliveryOutcome, NotificationSink};
use crate::source::NotificationSource;
use crate::state::SharedState;
use crate::telemetry::metrics;

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// No subject set, nothing fetched
    NoSubject,
    /// Backend returned an empty list
    Empty,
    /// Transport, status, timeout or body failure; no side effects
    FetchFailed,
    /// Identity changed mid-cycle; rest of the batch dropped
    Stale,
    /// Every record was looked at
    Completed,
}

/// Per-cycle summary, returned to the debug hook and logged
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub started_at: DateTime<Utc>,
    pub subject: Option<SubjectId>,
    pub outcome: PollOutcome,
    pub fetched: usize,
    pub delivered: usize,
    /// Passed to an unavailable native layer (no-op, still marked seen)
    pub inert: usize,
    pub skipped_seen: usize,
    pub failed: usize,
    pub malformed: usize,
}

impl PollReport {
    fn new(subject: Option<SubjectId>, outcome: PollOutcome) -> Self {
        Self {
            started_at: Utc::now(),
            subject,
            outcome,
            fetched: 0,
            delivered: 0,
            inert: 0,
            skipped_seen: 0,
            failed: 0,
            malformed: 0,
        }
    }
}

pub struct Poller<S, N> {
    state: Arc<SharedState>,
    source: S,
    sink: NotificationSink<N>,
    run_guard: Mutex<()>,
}

impl<S, N> Poller<S, N>
where
    S: NotificationSource + 'static,
    N: Notifier + 'static,
{
    pub fn new(state: Arc<SharedState>, source: S, sink: NotificationSink<N>) -> Self {
        Self {
            state,
            source,
            sink,
            run_guard: Mutex::new(()),
        }
    }

    /// One fetch-filter-deliver pass. Never fails; the report says what happened.
    pub async fn poll_once(&self) -> PollReport {
        let _running = self.run_guard.lock().await;
        let report = self.cycle().await;
        metrics::record_cycle();

        if report.delivered > 0 || report.failed > 0 {
            tracing::info!(
                subject = ?report.subject,
                delivered = report.delivered,
                failed = report.failed,
                skipped = report.skipped_seen,
                "Poll cycle delivered notifications"
            );
        } else {
            tracing::debug!(subject = ?report.subject, outcome = ?report.outcome, "Poll cycle done");
        }
        report
    }

    async fn cycle(&self) -> PollReport {
        let (subject, generation) = {
            let identity = self.state.identity.lock().await;
            (identity.subject(), identity.generation())
        };

        let Some(subject) = subject else {
            return PollReport::new(None, PollOutcome::NoSubject);
        };

        let batch = match self.source.fetch(subject).await {
            Ok(batch) => batch,
            Err(e) => {
                if e.is_fetch_failure() {
                    tracing::warn!(kind = e.kind(), subject = %subject, error = %e, "Poll fetch failed");
                } else {
                    tracing::error!(kind = e.kind(), subject = %subject, error = %e, "Poll source error");
                }
                metrics::record_fetch_failure();
                return PollReport::new(Some(subject), PollOutcome::FetchFailed);
            }
        };

        if batch.is_empty() {
            return PollReport::new(Some(subject), PollOutcome::Empty);
        }

        let mut report = PollReport::new(Some(subject), PollOutcome::Completed);
        report.fetched = batch.len();

        for item in batch {
            let notification = match item {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(kind = e.kind(), error = %e, "Skipping notification record");
                    report.malformed += 1;
                    continue;
                }
            };

            match self.check(&notification, generation).await {
                Check::Deliver => {}
                Check::Seen => {
                    report.skipped_seen += 1;
                    continue;
                }
                Check::Stale => {
                    report.outcome = PollOutcome::Stale;
                    break;
                }
            }

            match self.sink.deliver(&notification).await {
                Ok(outcome) => {
                    match outcome {
                        DeliveryOutcome::Shown { .. } => {
                            report.delivered += 1;
                            metrics::record_delivery();
                        }
                        DeliveryOutcome::Unavailable => report.inert += 1,
                    }
                    if let Some(id) = notification.id {
                        let recorded = self.state.identity.lock().await.mark_seen(generation, id);
                        if !recorded {
                            report.outcome = PollOutcome::Stale;
                            break;
                        }
                    }
                }
                Err(e) => {
                    // Not marked seen: retried next cycle
                    tracing::warn!(
                        kind = e.kind(),
                        id = ?notification.id,
                        error = %e,
                        "Notification delivery failed"
                    );
                    metrics::record_delivery_failure();
                    report.failed += 1;
                }
            }
        }

        if report.outcome == PollOutcome::Stale {
            tracing::debug!(subject = %subject, "Identity changed during poll, dropped rest of batch");
        }
        report
    }

    async fn check(&self, notification: &Notification, generation: u64) -> Check {
        let identity = self.state.identity.lock().await;
        if identity.generation() != generation {
            return Check::Stale;
        }
        match &notification.id {
            Some(id) if identity.seen().contains(id) => Check::Seen,
            _ => Check::Deliver,
        }
    }

    /// Poll every `period` until cancelled. The first cycle runs immediately;
    /// a cycle already in flight when cancellation arrives finishes.
    pub async fn run(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = period.as_secs(), "Poll loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Poll loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }
}

enum Check {
    Deliver,
    Seen,
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{HeraldError, Result};
    use crate::notification::{parse_batch, DEFAULT_TITLE};
    use crate::sink::testing::FakeNotifier;
    use crate::source::Batch;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a canned JSON body; `None` means the backend is down
    #[derive(Default)]
    struct FakeSource {
        body: std::sync::Mutex<Option<String>>,
        fetches: AtomicUsize,
        clear_identity_on_fetch: Option<Arc<SharedState>>,
    }

    impl FakeSource {
        fn serving(body: &str) -> Self {
            let source = Self::default();
            source.set_body(Some(body));
            source
        }

        fn set_body(&self, body: Option<&str>) {
            *self.body.lock().unwrap() = body.map(String::from);
        }
    }

    impl NotificationSource for Arc<FakeSource> {
        async fn fetch(&self, _subject: SubjectId) -> Result<Batch> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(state) = &self.clear_identity_on_fetch {
                state.clear_subject().await;
            }
            let body = self.body.lock().unwrap().clone();
            match body {
                Some(body) => parse_batch(&body),
                None => Err(HeraldError::Status(503)),
            }
        }
    }

    struct Harness {
        state: Arc<SharedState>,
        source: Arc<FakeSource>,
        notifier: Arc<FakeNotifier>,
        poller: Arc<Poller<Arc<FakeSource>, Arc<FakeNotifier>>>,
    }

    fn harness(source: FakeSource) -> Harness {
        let state = Arc::new(SharedState::new());
        let source = Arc::new(source);
        let notifier = Arc::new(FakeNotifier::default());
        let sink = NotificationSink::new(notifier.clone(), state.clone(), false);
        let poller = Arc::new(Poller::new(state.clone(), source.clone(), sink));
        Harness {
            state,
            source,
            notifier,
            poller,
        }
    }

    const THREE: &str = r#"[
        {"id": 1, "titre": "one", "redirect_url": "https://app/1"},
        {"id": 2, "titre": "two"},
        {"id": 3, "titre": "three"}
    ]"#;

    #[tokio::test]
    async fn test_no_subject_suppresses_fetch() {
        let h = harness(FakeSource::serving(THREE));

        let report = h.poller.poll_once().await;

        assert_eq!(report.outcome, PollOutcome::NoSubject);
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
        assert!(h.notifier.shown_titles().is_empty());
    }

    #[tokio::test]
    async fn test_seen_ids_delivered_at_most_once() {
        let h = harness(FakeSource::serving(THREE));
        h.state.set_subject_id(SubjectId(7)).await;

        let first = h.poller.poll_once().await;
        assert_eq!(first.delivered, 3);

        for _ in 0..3 {
            let again = h.poller.poll_once().await;
            assert_eq!(again.delivered, 0);
            assert_eq!(again.skipped_seen, 3);
        }
        assert_eq!(h.notifier.shown_titles(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_resetting_subject_allows_redelivery() {
        let h = harness(FakeSource::serving(THREE));
        h.state.set_subject_id(SubjectId(7)).await;
        h.poller.poll_once().await;

        // Same subject re-set: fresh dedupe state
        h.state.set_subject_id(SubjectId(7)).await;
        let report = h.poller.poll_once().await;
        assert_eq!(report.delivered, 3);

        // Clear then set another subject
        h.state.clear_subject().await;
        h.state.set_subject(&json!("8")).await.unwrap();
        let report = h.poller.poll_once().await;
        assert_eq!(report.delivered, 3);
        assert_eq!(h.notifier.shown_titles().len(), 9);
    }

    #[tokio::test]
    async fn test_failed_delivery_isolated_and_retried() {
        let h = harness(FakeSource::serving(THREE));
        h.state.set_subject_id(SubjectId(1)).await;
        h.notifier.fail_title("two");

        let report = h.poller.poll_once().await;
        assert_eq!(report.outcome, PollOutcome::Completed);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(h.notifier.shown_titles(), vec!["one", "three"]);

        h.notifier.heal();
        let report = h.poller.poll_once().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped_seen, 2);
        assert_eq!(h.notifier.shown_titles(), vec!["one", "three", "two"]);
    }

    #[tokio::test]
    async fn test_records_without_id_redeliver_every_cycle() {
        let h = harness(FakeSource::serving(r#"[{}]"#));
        h.state.set_subject_id(SubjectId(1)).await;

        h.poller.poll_once().await;
        h.poller.poll_once().await;

        let shown = h.notifier.shown.lock().unwrap().clone();
        assert_eq!(
            shown,
            vec![
                (DEFAULT_TITLE.to_string(), String::new()),
                (DEFAULT_TITLE.to_string(), String::new()),
            ]
        );
        assert!(h.state.identity.lock().await.seen().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_has_no_side_effects() {
        let h = harness(FakeSource::default());
        h.state.set_subject_id(SubjectId(1)).await;

        let report = h.poller.poll_once().await;
        assert_eq!(report.outcome, PollOutcome::FetchFailed);
        assert!(h.notifier.shown_titles().is_empty());

        // Recovers on the next cycle
        h.source.set_body(Some(THREE));
        assert_eq!(h.poller.poll_once().await.delivered, 3);
    }

    #[tokio::test]
    async fn test_non_list_body_is_ignored() {
        let h = harness(FakeSource::serving(r#"{"error": "nope"}"#));
        h.state.set_subject_id(SubjectId(1)).await;

        let report = h.poller.poll_once().await;
        assert_eq!(report.outcome, PollOutcome::FetchFailed);
        assert!(h.notifier.shown_titles().is_empty());
    }

    #[tokio::test]
    async fn test_empty_list() {
        let h = harness(FakeSource::serving("[]"));
        h.state.set_subject_id(SubjectId(1)).await;
        assert_eq!(h.poller.poll_once().await.outcome, PollOutcome::Empty);
    }

    #[tokio::test]
    async fn test_malformed_record_skipped() {
        let h = harness(FakeSource::serving(r#"[{"id": 1, "titre": "ok"}, 42, {"id": 2, "titre": "also"}]"#));
        h.state.set_subject_id(SubjectId(1)).await;

        let report = h.poller.poll_once().await;
        assert_eq!(report.malformed, 1);
        assert_eq!(h.notifier.shown_titles(), vec!["ok", "also"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_within_batch() {
        let h = harness(FakeSource::serving(r#"[{"id": 5, "titre": "a"}, {"id": 5, "titre": "b"}]"#));
        h.state.set_subject_id(SubjectId(1)).await;

        let report = h.poller.poll_once().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped_seen, 1);
    }

    #[tokio::test]
    async fn test_unavailable_native_layer_marks_seen() {
        let h = harness(FakeSource::serving(THREE));
        h.state.set_subject_id(SubjectId(1)).await;
        h.notifier.unavailable.store(true, Ordering::Relaxed);

        let report = h.poller.poll_once().await;
        assert_eq!(report.inert, 3);
        assert_eq!(report.delivered, 0);
        assert!(h.state.redirects.lock().await.is_empty());
        assert_eq!(h.state.identity.lock().await.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_identity_change_during_fetch_drops_batch() {
        let state = Arc::new(SharedState::new());
        let source = FakeSource {
            clear_identity_on_fetch: Some(state.clone()),
            ..FakeSource::serving(THREE)
        };
        let source = Arc::new(source);
        let notifier = Arc::new(FakeNotifier::default());
        let sink = NotificationSink::new(notifier.clone(), state.clone(), false);
        let poller = Poller::new(state.clone(), source, sink);

        state.set_subject_id(SubjectId(1)).await;
        let report = poller.poll_once().await;

        assert_eq!(report.outcome, PollOutcome::Stale);
        assert!(notifier.shown_titles().is_empty());
        assert!(state.identity.lock().await.seen().is_empty());
    }

    #[tokio::test]
    async fn test_run_polls_immediately_and_stops_on_cancel() {
        let h = harness(FakeSource::serving(THREE));
        h.state.set_subject_id(SubjectId(1)).await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            h.poller
                .clone()
                .run(Duration::from_secs(3600), cancel.clone()),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.source.fetches.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first cycle should run without waiting a full period");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should stop after cancel")
            .unwrap();
        assert_eq!(h.source.fetches.load(Ordering::SeqCst), 1);
    }
}
