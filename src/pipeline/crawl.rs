// src/pipeline/crawl.rs

//! Job posting crawl.
//!
//! Walks the listing space one page at a time, skips listings the store
//! already holds in a current state, fetches the remaining detail pages and
//! upserts the resulting postings. Requests are strictly sequential.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::time::Instant;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlParams, CrawlerConfig, JobPosting, ListingRow, RunReport, StopReason};
use crate::pipeline::circuit_breaker::CircuitBreaker;
use crate::services::{FetchStrategy, Fetcher, HttpSource, JobSite, PageSource, PolitenessPolicy, RetryPolicy};
use crate::storage::RecordStore;
use crate::utils::http;

/// Revisit windows are capped at a century.
const MAX_REVISIT_HOURS: u64 = 24 * 365 * 100;

/// Per-run mutable crawl state.
struct CrawlState {
    report: RunReport,
    breaker: CircuitBreaker,
    /// Fingerprints handled in this run
    seen: HashSet<String>,
    empty_pages: u32,
}

/// Orchestrates one crawl run over the target site.
pub struct CrawlController<'a> {
    config: CrawlerConfig,
    site: JobSite,
    fetcher: Fetcher,
    store: &'a dyn RecordStore,
    cancel: Arc<AtomicBool>,
}

impl<'a> CrawlController<'a> {
    pub fn new(config: CrawlerConfig, site: JobSite, fetcher: Fetcher, store: &'a dyn RecordStore) -> Self {
        Self {
            config,
            site,
            fetcher,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop between records once `cancel` is set.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Crawl until a stop condition holds and record the run report.
    ///
    /// A tripped circuit breaker still records the report (stop reason
    /// `aborted`) before the `CrawlAborted` error is returned. Records
    /// upserted before the failure stay in the store.
    pub async fn run(&self, params: &CrawlParams) -> Result<RunReport> {
        let mut state = CrawlState {
            report: RunReport::start(params.mode.clone(), Utc::now()),
            breaker: CircuitBreaker::new(self.config.max_consecutive_failures),
            seen: HashSet::new(),
            empty_pages: 0,
        };

        log::info!(
            "Starting {} crawl{} (limit: {})",
            params.mode.name(),
            params.mode.query().map(|q| format!(" for {q:?}")).unwrap_or_default(),
            params.limit.map_or("none".to_string(), |l| l.to_string())
        );

        let outcome = self.crawl(params, &mut state).await;
        let reason = match &outcome {
            Ok(reason) => *reason,
            Err(_) => StopReason::Aborted,
        };
        state.report.finish(reason, Utc::now());

        if let Err(e) = self.store.record_run(&state.report).await {
            log::error!("Failed to record run report: {}", e);
        }

        match outcome {
            Ok(_) => {
                log::info!("{}", state.report.summary());
                Ok(state.report)
            }
            Err(e) => {
                log::error!("{}", state.report.summary());
                Err(e)
            }
        }
    }

    async fn crawl(&self, params: &CrawlParams, state: &mut CrawlState) -> Result<StopReason> {
        let started = Instant::now();
        let mut page = self.site.first_page(&params.mode);

        loop {
            if let Some(reason) = self.stop_reason(params, &state.report, started) {
                return Ok(reason);
            }

            let raw = match self.fetcher.fetch_listing_page(&page).await {
                Ok(Some(raw)) => {
                    state.breaker.record_success();
                    raw
                }
                Ok(None) => return Ok(StopReason::NoMorePages),
                Err(AppError::PolicyBlocked { url }) => {
                    log::warn!("Listing page {url} is disallowed by robots.txt; stopping");
                    state.report.skipped += 1;
                    return Ok(StopReason::Blocked);
                }
                Err(e @ AppError::FetchFailed { .. }) => {
                    log::warn!("Listing page {} failed: {}", page.page(), e);
                    state.report.failed += 1;
                    state.breaker.record_failure()?;
                    page = page.next();
                    continue;
                }
                Err(e) => return Err(e),
            };

            state.report.pages_visited += 1;
            let listing = self.site.parse_listing(&raw);
            state.report.skipped += listing.skipped as u32;
            log::info!(
                "Listing page {}: {} row(s), {} skipped",
                page.page(),
                listing.rows.len(),
                listing.skipped
            );

            if listing.rows.is_empty() {
                state.empty_pages += 1;
                if state.empty_pages >= self.config.max_empty_pages {
                    return Ok(StopReason::EmptyPages);
                }
            } else {
                state.empty_pages = 0;
            }

            for row in listing.rows {
                if let Some(reason) = self.stop_reason(params, &state.report, started) {
                    return Ok(reason);
                }
                self.collect(row, state).await?;
            }

            if !listing.has_next {
                return Ok(StopReason::NoMorePages);
            }
            page = page.next();
        }
    }

    /// Handle one listing row: skip, refresh or fetch and upsert.
    async fn collect(&self, row: ListingRow, state: &mut CrawlState) -> Result<()> {
        let fingerprint = row.fingerprint();
        if !state.seen.insert(fingerprint.clone()) {
            log::debug!("Already handled in this run: {}", row.source_url);
            return Ok(());
        }

        let now = Utc::now();
        if let Some(mut stored) = self.store.get(&fingerprint).await? {
            if now - stored.last_seen_at < self.revisit_window() {
                stored.last_seen_at = now;
                self.store.upsert(stored).await?;
                state.report.refreshed += 1;
                state.report.collected += 1;
                return Ok(());
            }
            log::debug!("Stored copy of {} is stale; refetching", row.source_url);
        }

        let url = match Url::parse(&row.source_url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Skipping {}: invalid URL ({})", row.source_url, e);
                state.report.skipped += 1;
                return Ok(());
            }
        };

        match self.fetcher.fetch_job_detail(&url).await {
            Ok(raw) => {
                state.breaker.record_success();
                state.report.fetched += 1;
                let detail = self.site.parse_detail(&raw);
                let posting = JobPosting::from_parts(row, detail, Utc::now());
                if self.store.upsert(posting).await?.is_new() {
                    state.report.new_records += 1;
                }
                state.report.collected += 1;
            }
            Err(AppError::PolicyBlocked { url }) => {
                log::info!("Skipping {url}: disallowed by robots.txt");
                state.report.skipped += 1;
            }
            Err(e @ AppError::FetchFailed { .. }) => {
                log::warn!("Skipping {}: {}", row.source_url, e);
                state.report.failed += 1;
                state.breaker.record_failure()?;
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    fn stop_reason(&self, params: &CrawlParams, report: &RunReport, started: Instant) -> Option<StopReason> {
        if self.cancel.load(Ordering::SeqCst) {
            log::warn!("Cancellation requested; stopping crawl");
            return Some(StopReason::Cancelled);
        }
        if params.limit.is_some_and(|limit| report.collected as usize >= limit) {
            return Some(StopReason::LimitReached);
        }
        if let Some(budget) = self.config.max_run_secs.map(Duration::from_secs) {
            if started.elapsed() >= budget {
                log::warn!("Run time budget of {budget:?} spent; stopping crawl");
                return Some(StopReason::TimeBudget);
            }
        }
        None
    }

    fn revisit_window(&self) -> TimeDelta {
        TimeDelta::hours(self.config.revisit_after_hours.min(MAX_REVISIT_HOURS) as i64)
    }
}

/// Run a crawl against the live site.
///
/// robots.txt is always read over plain HTTP; the page strategy (HTTP or
/// browser) is chosen once from the site's render mode.
pub async fn run_crawler(
    config: &Config,
    store: &dyn RecordStore,
    params: &CrawlParams,
    cancel: Arc<AtomicBool>,
) -> Result<RunReport> {
    let client = http::create_async_client(&config.crawler)?;
    let base_url = Url::parse(&config.site.base_url)?;
    let policy = PolitenessPolicy::load(&HttpSource::new(client.clone()), &base_url, &config.crawler, &config.politeness).await;

    let strategy = FetchStrategy::for_render(config.site.render, params.headless);
    log::info!("Fetch strategy: {:?}", strategy);
    let source = strategy.build_source(client)?;

    crawl_with_policy(config, store, source, Arc::new(policy), params, cancel).await
}

/// Run a crawl with pages (robots.txt included) served by `source`.
pub async fn run_crawler_with_source(
    config: &Config,
    store: &dyn RecordStore,
    source: Arc<dyn PageSource>,
    params: &CrawlParams,
    cancel: Arc<AtomicBool>,
) -> Result<RunReport> {
    let base_url = Url::parse(&config.site.base_url)?;
    let policy = PolitenessPolicy::load(source.as_ref(), &base_url, &config.crawler, &config.politeness).await;
    crawl_with_policy(config, store, source, Arc::new(policy), params, cancel).await
}

async fn crawl_with_policy(
    config: &Config,
    store: &dyn RecordStore,
    source: Arc<dyn PageSource>,
    policy: Arc<PolitenessPolicy>,
    params: &CrawlParams,
    cancel: Arc<AtomicBool>,
) -> Result<RunReport> {
    let site = JobSite::new(&config.site)?;
    let fetcher = Fetcher::new(
        source,
        policy,
        RetryPolicy::from_config(&config.crawler),
        site.base_url().clone(),
    );

    CrawlController::new(config.crawler.clone(), site, fetcher, store)
        .with_cancel(cancel)
        .run(params)
        .await
}
