//! Page retrieval with per-site timeouts and bounded retry.
//!
//! # Architecture
//!
//! - [`FetchPage`]: core trait, "give me the HTML at this URL"
//! - [`HttpFetcher`]: reqwest implementation with connect/request timeouts
//! - [`RetryFetch`]: decorator that retries any [`FetchPage`] on transient errors
//! - [`SiteClient`]: what a site scraper holds; retrying fetcher for the entry
//!   page, plain fetcher for pagination and detail pages
//!
//! # Retry strategy
//!
//! Only the first listing page is retried. The delay grows linearly with the
//! attempt number, plus 0-250ms of random jitter:
//! ```text
//! delay = base_delay * attempt + random_jitter(0..250ms)
//! ```

use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::ScrapeError;

/// A desktop browser user agent; several of the sites refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Retrieve the body of a page.
#[allow(async_fn_in_trait)]
pub trait FetchPage {
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError>;
}

/// Timeouts and identity for an [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// reqwest-backed [`FetchPage`]. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| ScrapeError::from_reqwest("<client>", e))?;
        Ok(Self { client })
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success status");
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url.as_str(), e))?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched page");
        Ok(body)
    }
}

/// Wrapper that adds bounded retry to any [`FetchPage`] implementation.
pub struct RetryFetch<T> {
    /// The underlying fetcher.
    inner: T,
    /// Total attempts, including the first one.
    max_attempts: usize,
    /// Delay after the first failure; later delays are multiples of it.
    base_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    pub fn new(inner: T, max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let jitter_ms: u64 = rng().random_range(0..=250);
        self.base_delay.saturating_mul(attempt as u32) + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let total_dt = total_t0.elapsed();
                    if attempt >= self.max_attempts || !e.is_transient() {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "Page load failed"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Page load failed; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// HTTP access for one site.
#[derive(Debug)]
pub struct SiteClient {
    entry: RetryFetch<HttpFetcher>,
}

impl SiteClient {
    pub fn new(
        settings: &FetchSettings,
        entry_attempts: usize,
        retry_delay: Duration,
    ) -> Result<Self, ScrapeError> {
        let http = HttpFetcher::new(settings)?;
        Ok(Self {
            entry: RetryFetch::new(http, entry_attempts, retry_delay),
        })
    }

    /// First listing page, retried on transient failures.
    pub async fn entry(&self, url: &Url) -> Result<String, ScrapeError> {
        self.entry.fetch(url).await
    }

    /// Any other page, single attempt.
    pub async fn page(&self, url: &Url) -> Result<String, ScrapeError> {
        self.entry.inner().fetch(url).await
    }
}
