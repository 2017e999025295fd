//! Backend notification listing
//!
//! One uncached GET per poll cycle: `<base>/notifications?user_id=<id>`.
//! No retries; any failure means "no data this cycle".

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use tokio::time::timeout;

use crate::errors::{HeraldError, Result};
use crate::identity::SubjectId;
use crate::notification::{parse_batch, Notification};

/// Per-record parse results for one fetched batch
pub type Batch = Vec<Result<Notification>>;

/// Where poll cycles get their notifications from
pub trait NotificationSource: Send + Sync {
    fn fetch(&self, subject: SubjectId) -> impl Future<Output = Result<Batch>> + Send;
}

/// Reads the listing over HTTP with reqwest
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Listing endpoint, without the query string
    pub fn listing_url(&self) -> String {
        format!("{}/notifications", self.base_url.trim_end_matches('/'))
    }

    fn no_cache_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers
    }

    async fn get_listing(&self, subject: SubjectId) -> Result<String> {
        let resp = self
            .http
            .get(self.listing_url())
            .query(&[("user_id", subject.0)])
            .headers(Self::no_cache_headers())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HeraldError::Status(status.as_u16()));
        }

        Ok(resp.text().await?)
    }
}

impl NotificationSource for HttpSource {
    async fn fetch(&self, subject: SubjectId) -> Result<Batch> {
        let body = timeout(self.timeout, self.get_listing(subject))
            .await
            .map_err(|_| HeraldError::Timeout(self.timeout.as_secs()))??;

        parse_batch(&body)
    }
}
