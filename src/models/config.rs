//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, retry and stopping behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Inter-request delay settings
    #[serde(default)]
    pub politeness: PolitenessConfig,

    /// Target site layout
    #[serde(default)]
    pub site: SiteConfig,

    /// File locations relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.robots_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.robots_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_consecutive_failures == 0 {
            return Err(AppError::validation(
                "crawler.max_consecutive_failures must be > 0",
            ));
        }
        if self.crawler.max_empty_pages == 0 {
            return Err(AppError::validation("crawler.max_empty_pages must be > 0"));
        }
        if self.politeness.fallback_delay_ms < self.politeness.min_delay_ms {
            return Err(AppError::validation(
                "politeness.fallback_delay_ms must be >= politeness.min_delay_ms",
            ));
        }
        if self.politeness.max_delay_ms < self.politeness.fallback_delay_ms
            || self.politeness.max_delay_ms < self.politeness.default_delay_ms
        {
            return Err(AppError::validation(
                "politeness.max_delay_ms must be >= the default and fallback delays",
            ));
        }
        url::Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url: {e}")))?;
        if self.site.internship_category.trim().is_empty() {
            return Err(AppError::validation("site.internship_category is empty"));
        }
        for selector in self.site.selectors.all() {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Product token matched against robots.txt user-agent groups
    #[serde(default = "defaults::robots_agent")]
    pub robots_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff step; doubles on every retry
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Consecutive fetch failures that abort the run
    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Consecutive listing pages without rows that end the crawl
    #[serde(default = "defaults::max_empty_pages")]
    pub max_empty_pages: u32,

    /// Known listings seen within this window skip the detail fetch
    #[serde(default = "defaults::revisit_after_hours")]
    pub revisit_after_hours: u64,

    /// Optional wall-clock budget for a single run
    #[serde(default)]
    pub max_run_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            robots_agent: defaults::robots_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
            max_empty_pages: defaults::max_empty_pages(),
            revisit_after_hours: defaults::revisit_after_hours(),
            max_run_secs: None,
        }
    }
}

/// Delay settings. The effective crawl delay is the robots.txt value
/// (or `default_delay_ms` if absent), clamped to `min_delay_ms..=max_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Delay when robots.txt exists but names no Crawl-delay
    #[serde(default = "defaults::default_delay")]
    pub default_delay_ms: u64,

    /// Conservative delay when robots.txt could not be fetched
    #[serde(default = "defaults::fallback_delay")]
    pub fallback_delay_ms: u64,

    /// Floor applied to any delay
    #[serde(default = "defaults::min_delay")]
    pub min_delay_ms: u64,

    /// Ceiling applied to a Crawl-delay declared by the site
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: defaults::default_delay(),
            fallback_delay_ms: defaults::fallback_delay(),
            min_delay_ms: defaults::min_delay(),
            max_delay_ms: defaults::max_delay(),
        }
    }
}

/// How listing and detail pages are rendered by the target site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Plain HTML; fetched over HTTP
    #[default]
    Static,
    /// Needs script execution; fetched with a browser
    Script,
}

/// Target site layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site root, e.g. `https://opportunitiesforyoungkenyans.co.ke`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Category slug holding internship postings
    #[serde(default = "defaults::internship_category")]
    pub internship_category: String,

    /// Page rendering; selects the fetch strategy
    #[serde(default)]
    pub render: RenderMode,

    /// Run the browser without a window (script mode only)
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Listing rows whose title contains one of these are not job posts
    #[serde(default = "defaults::skip_title_keywords")]
    pub skip_title_keywords: Vec<String>,

    /// Place names searched in descriptions when no `Location:` line exists
    #[serde(default = "defaults::location_phrases")]
    pub location_phrases: Vec<String>,

    /// CSS selectors for listing and detail pages
    #[serde(default)]
    pub selectors: SiteSelectors,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            internship_category: defaults::internship_category(),
            render: RenderMode::default(),
            headless: defaults::headless(),
            skip_title_keywords: defaults::skip_title_keywords(),
            location_phrases: defaults::location_phrases(),
            selectors: SiteSelectors::default(),
        }
    }
}

/// CSS selectors for a WordPress-style job board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSelectors {
    #[serde(default = "defaults::row_selector")]
    pub row: String,
    #[serde(default = "defaults::title_selector")]
    pub title: String,
    #[serde(default = "defaults::date_selector")]
    pub date: String,
    #[serde(default = "defaults::tag_selector")]
    pub tags: String,
    #[serde(default = "defaults::next_selector")]
    pub next_page: String,
    #[serde(default = "defaults::body_selector")]
    pub body: String,
}

impl SiteSelectors {
    /// All selectors, for validation.
    pub fn all(&self) -> [&str; 6] {
        [
            self.row.as_str(),
            self.title.as_str(),
            self.date.as_str(),
            self.tags.as_str(),
            self.next_page.as_str(),
            self.body.as_str(),
        ]
    }
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            row: defaults::row_selector(),
            title: defaults::title_selector(),
            date: defaults::date_selector(),
            tags: defaults::tag_selector(),
            next_page: defaults::next_selector(),
            body: defaults::body_selector(),
        }
    }
}

/// File locations, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::raw_export")]
    pub raw_export: String,
    #[serde(default = "defaults::processed")]
    pub processed: String,
    #[serde(default = "defaults::stats")]
    pub stats: String,
    /// Normalization rule tables; built-in tables when absent
    #[serde(default = "defaults::rules")]
    pub rules: String,
    /// Skill taxonomy; built-in taxonomy when absent
    #[serde(default = "defaults::taxonomy")]
    pub taxonomy: String,
}

impl PathsConfig {
    pub fn resolve(&self, storage_dir: &Path, relative: &str) -> PathBuf {
        storage_dir.join(relative)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_export: defaults::raw_export(),
            processed: defaults::processed(),
            stats: defaults::stats(),
            rules: defaults::rules(),
            taxonomy: defaults::taxonomy(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; jobmarket/0.1; +https://github.com/jobmarket)".into()
    }
    pub fn robots_agent() -> String {
        "jobmarket".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        500
    }
    pub fn max_consecutive_failures() -> u32 {
        3
    }
    pub fn max_empty_pages() -> u32 {
        2
    }
    pub fn revisit_after_hours() -> u64 {
        168
    }

    // Politeness defaults
    pub fn default_delay() -> u64 {
        2_000
    }
    pub fn fallback_delay() -> u64 {
        10_000
    }
    pub fn min_delay() -> u64 {
        1_000
    }
    pub fn max_delay() -> u64 {
        60_000
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://opportunitiesforyoungkenyans.co.ke".into()
    }
    pub fn internship_category() -> String {
        "internships".into()
    }
    pub fn headless() -> bool {
        true
    }
    pub fn skip_title_keywords() -> Vec<String> {
        vec!["gallery".into(), "video".into(), "news update".into()]
    }
    pub fn location_phrases() -> Vec<String> {
        ["Nairobi", "Mombasa", "Kisumu", "Nakuru", "Eldoret", "Thika", "Remote", "Kenya"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn row_selector() -> String {
        "article, div.post, li.post-item".into()
    }
    pub fn title_selector() -> String {
        "h2.entry-title a, h3 a, a.entry-title, .post-title a".into()
    }
    pub fn date_selector() -> String {
        "time, .entry-date, span.date, .post-date".into()
    }
    pub fn tag_selector() -> String {
        "a[rel~=\"tag\"], .cat-links a, .tags-links a".into()
    }
    pub fn next_selector() -> String {
        "a.next, a.next.page-numbers, .nav-previous a".into()
    }
    pub fn body_selector() -> String {
        "article .entry-content, div.post-content, .single-content".into()
    }

    // Path defaults
    pub fn raw_export() -> String {
        "raw/jobs.csv".into()
    }
    pub fn processed() -> String {
        "processed/jobs_cleaned.csv".into()
    }
    pub fn stats() -> String {
        "processed/aggregate_stats.csv".into()
    }
    pub fn rules() -> String {
        "rules.toml".into()
    }
    pub fn taxonomy() -> String {
        "taxonomy.toml".into()
    }
}
