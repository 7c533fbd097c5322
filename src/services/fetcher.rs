// src/services/fetcher.rs

//! Polite, retrying page retrieval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, RenderMode};
use crate::services::{HttpSource, PageRef, PageSource, PolitenessPolicy, RawPage};

/// Retry budget and backoff for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Wait before retry number `retry` (0-based): `base * 2^retry`.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// How pages are retrieved for a whole crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain HTTP and HTML parsing
    Http,
    /// Browser automation for script-rendered pages
    Browser { headless: bool },
}

impl FetchStrategy {
    /// Pick the strategy for a target from how it renders.
    pub fn for_render(render: RenderMode, headless: bool) -> Self {
        match render {
            RenderMode::Static => Self::Http,
            RenderMode::Script => Self::Browser { headless },
        }
    }

    /// Build the page source this strategy calls for.
    pub fn build_source(self, client: reqwest::Client) -> Result<Arc<dyn PageSource>> {
        match self {
            Self::Http => Ok(Arc::new(HttpSource::new(client))),
            #[cfg(feature = "browser")]
            Self::Browser { headless } => Ok(Arc::new(crate::services::BrowserSource::new(headless))),
            #[cfg(not(feature = "browser"))]
            Self::Browser { .. } => Err(AppError::config(
                "script rendering needs the `browser` feature; rebuild with --features browser",
            )),
        }
    }
}

/// Retrieves listing and detail pages.
///
/// Every attempt first checks the robots rules and waits for the host's
/// turn. At most one request is in flight at a time.
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    policy: Arc<PolitenessPolicy>,
    retry: RetryPolicy,
    base_url: Url,
    in_flight: Mutex<()>,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn PageSource>,
        policy: Arc<PolitenessPolicy>,
        retry: RetryPolicy,
        base_url: Url,
    ) -> Self {
        Self {
            source,
            policy,
            retry,
            base_url,
            in_flight: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &PolitenessPolicy {
        &self.policy
    }

    /// Fetch one listing page. `Ok(None)` means the page does not exist,
    /// which ends the listing.
    pub async fn fetch_listing_page(&self, page: &PageRef) -> Result<Option<RawPage>> {
        let url = page.url(&self.base_url)?;
        let raw = self.fetch(&url).await?;
        if raw.is_gone() {
            log::info!("Listing page {} answered HTTP {}; end of listing", url, raw.status);
            return Ok(None);
        }
        if !raw.is_success() {
            return Err(AppError::fetch_failed(url.as_str(), 1, format!("HTTP {}", raw.status)));
        }
        Ok(Some(raw))
    }

    /// Fetch a job detail page; any non-2xx answer is a failure.
    pub async fn fetch_job_detail(&self, url: &Url) -> Result<RawPage> {
        let raw = self.fetch(url).await?;
        if !raw.is_success() {
            return Err(AppError::fetch_failed(url.as_str(), 1, format!("HTTP {}", raw.status)));
        }
        Ok(raw)
    }

    async fn fetch(&self, url: &Url) -> Result<RawPage> {
        if !self.policy.allowed(url) {
            return Err(AppError::PolicyBlocked {
                url: url.to_string(),
            });
        }

        let _slot = self.in_flight.lock().await;
        let attempts = self.retry.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let wait = self.retry.backoff(attempt - 2);
                log::warn!(
                    "Retrying {url} in {wait:?} (attempt {attempt}/{attempts}): {last_error}"
                );
                tokio::time::sleep(wait).await;
            }

            self.policy.wait_turn(url).await;
            match self.source.get(url).await {
                Ok(page) if page.is_retryable() => {
                    last_error = format!("HTTP {}", page.status);
                }
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() => {
                    last_error = e.to_string();
                }
                Err(e) => return Err(AppError::fetch_failed(url.as_str(), attempt, e)),
            }
        }

        Err(AppError::fetch_failed(url.as_str(), attempts, last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PolitenessConfig;
    use crate::services::source::testing::CannedSource;
    use tokio::time::Instant;

    const BASE: &str = "https://jobs.example.com";

    fn politeness() -> Arc<PolitenessPolicy> {
        let config = PolitenessConfig {
            default_delay_ms: 2_000,
            fallback_delay_ms: 10_000,
            min_delay_ms: 1_000,
            max_delay_ms: 60_000,
        };
        let robots = "User-agent: *\nDisallow: /wp-admin/\n".to_string();
        Arc::new(PolitenessPolicy::new(Some(robots), "jobmarket", &config))
    }

    fn retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }

    fn fetcher(source: CannedSource) -> (Fetcher, Arc<CannedSource>) {
        let source = Arc::new(source);
        let fetcher = Fetcher::new(
            Arc::clone(&source) as Arc<dyn PageSource>,
            politeness(),
            retry(),
            Url::parse(BASE).unwrap(),
        );
        (fetcher, source)
    }

    #[test]
    fn backoff_doubles() {
        let policy = retry();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2_000));
    }

    #[test]
    fn strategy_follows_render_mode() {
        assert_eq!(FetchStrategy::for_render(RenderMode::Static, false), FetchStrategy::Http);
        assert_eq!(
            FetchStrategy::for_render(RenderMode::Script, false),
            FetchStrategy::Browser { headless: false }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_path_is_never_requested() {
        let (fetcher, source) = fetcher(CannedSource::default());
        let url = Url::parse("https://jobs.example.com/wp-admin/jobs").unwrap();

        let err = fetcher.fetch_job_detail(&url).await.unwrap_err();
        assert!(matches!(err, AppError::PolicyBlocked { .. }));
        assert_eq!(source.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_then_succeed() {
        let detail = "https://jobs.example.com/2025/01/data-intern/";
        let (fetcher, source) = fetcher(CannedSource::default().sequence(
            detail,
            vec![
                Ok((503, String::new())),
                Err(AppError::Transport("reset".into())),
                Ok((200, "<html></html>".into())),
            ],
        ));

        let page = fetcher.fetch_job_detail(&Url::parse(detail).unwrap()).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(source.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_fetch_failed() {
        let detail = "https://jobs.example.com/2025/01/flaky/";
        let (fetcher, source) = fetcher(CannedSource::default().page(detail, 500, ""));

        let err = fetcher.fetch_job_detail(&Url::parse(detail).unwrap()).await.unwrap_err();
        match err {
            AppError::FetchFailed { attempts, message, .. } => {
                assert_eq!(attempts, 4);
                assert_eq!(message, "HTTP 500");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_listing_page_ends_the_listing() {
        let (fetcher, _) = fetcher(CannedSource::default());
        let page = PageRef::Category {
            slug: "internships".into(),
            page: 7,
        };
        assert!(fetcher.fetch_listing_page(&page).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn requests_respect_crawl_delay() {
        let first = "https://jobs.example.com/a/";
        let second = "https://jobs.example.com/b/";
        let (fetcher, _) = fetcher(
            CannedSource::default()
                .page(first, 200, "a")
                .page(second, 200, "b"),
        );

        let start = Instant::now();
        fetcher.fetch_job_detail(&Url::parse(first).unwrap()).await.unwrap();
        fetcher.fetch_job_detail(&Url::parse(second).unwrap()).await.unwrap();
        assert!(Instant::now() - start >= fetcher.policy().crawl_delay());
    }
}
