//! Crawl parameters and the per-run report kept in the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which part of the listing space a crawl walks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CrawlMode {
    /// The internship category, page by page
    #[default]
    Internships,
    /// Site search results for a free-text query
    Search { query: String },
}

impl CrawlMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Internships => "internships",
            Self::Search { .. } => "search",
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Internships => None,
            Self::Search { query } => Some(query),
        }
    }
}

/// Parameters fixed for the duration of one crawl.
#[derive(Debug, Clone)]
pub struct CrawlParams {
    pub mode: CrawlMode,
    /// Maximum records to collect; unbounded when `None`
    pub limit: Option<usize>,
    /// Hide the browser window (script rendering only)
    pub headless: bool,
}

impl Default for CrawlParams {
    fn default() -> Self {
        Self {
            mode: CrawlMode::default(),
            limit: None,
            headless: true,
        }
    }
}

/// Why a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    LimitReached,
    EmptyPages,
    NoMorePages,
    /// robots.txt disallows the next listing page
    Blocked,
    TimeBudget,
    Cancelled,
    Aborted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LimitReached => "limit reached",
            Self::EmptyPages => "too many empty pages",
            Self::NoMorePages => "no more pages",
            Self::Blocked => "listing blocked by robots.txt",
            Self::TimeBudget => "time budget spent",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Counters for one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: CrawlMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_visited: u32,
    /// Records collected (new, refetched or refreshed)
    pub collected: u32,
    /// Detail pages retrieved
    pub fetched: u32,
    pub new_records: u32,
    /// Known records whose `last_seen_at` was bumped without a detail fetch
    pub refreshed: u32,
    /// Rows dropped by title filters or robots rules
    pub skipped: u32,
    pub failed: u32,
    pub stop_reason: StopReason,
}

impl RunReport {
    pub fn start(mode: CrawlMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            started_at,
            finished_at: started_at,
            pages_visited: 0,
            collected: 0,
            fetched: 0,
            new_records: 0,
            refreshed: 0,
            skipped: 0,
            failed: 0,
            stop_reason: StopReason::NoMorePages,
        }
    }

    pub fn finish(&mut self, reason: StopReason, at: DateTime<Utc>) {
        self.stop_reason = reason;
        self.finished_at = at;
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} crawl: {} pages, {} collected ({} new, {} refreshed), {} fetched, {} skipped, {} failed; stopped: {}",
            self.mode.name(),
            self.pages_visited,
            self.collected,
            self.new_records,
            self.refreshed,
            self.fetched,
            self.skipped,
            self.failed,
            self.stop_reason
        )
    }
}
