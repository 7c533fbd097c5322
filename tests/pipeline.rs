//! Crawl → store → export → process against an in-process fake site.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobmarket::error::{AppError, Result};
use jobmarket::models::{Config, CrawlParams, StopReason};
use jobmarket::pipeline::{run_crawler_with_source, run_export, run_process};
use jobmarket::services::{PageSource, RawPage};
use jobmarket::storage::tabular::{read_processed, read_stats};
use jobmarket::storage::{LocalStore, RecordStore};
use tempfile::TempDir;
use tokio::time::Instant;
use url::Url;

const BASE: &str = "https://board.example.org";

/// Serves fixed pages and records when each request arrived.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<(String, Instant)>>,
}

impl FakeSite {
    fn with(mut self, path: &str, status: u16, body: impl Into<String>) -> Self {
        self.pages.insert(format!("{BASE}{path}"), (status, body.into()));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl PageSource for FakeSite {
    async fn get(&self, url: &Url) -> Result<RawPage> {
        self.requests.lock().unwrap().push((url.to_string(), Instant::now()));
        let (status, body) = self
            .pages
            .get(url.as_str())
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(RawPage {
            url: url.clone(),
            status,
            body,
        })
    }
}

fn listing(rows: &[(&str, &str)], next: bool) -> String {
    let mut html = String::from("<html><body><main>");
    for (slug, title) in rows {
        html.push_str(&format!(
            r#"<article class="post">
                 <h2 class="entry-title"><a href="/{slug}/">{title}</a></h2>
                 <time datetime="2025-06-02T08:00:00+03:00">June 2, 2025</time>
               </article>"#
        ));
    }
    if next {
        html.push_str(r#"<a class="next page-numbers" href="page/2/">Next</a>"#);
    }
    html.push_str("</main></body></html>");
    html
}

fn detail(lines: &[&str]) -> String {
    let body: String = lines.iter().map(|line| format!("<p>{line}</p>")).collect();
    format!(r#"<html><body><article><div class="entry-content">{body}</div></article></body></html>"#)
}

fn three_job_site() -> FakeSite {
    FakeSite::default()
        .with(
            "/category/internships/",
            200,
            listing(
                &[
                    ("acme-data-analyst", "Acme Hiring Data Analyst"),
                    ("beta-web-developer", "Beta Hiring Web Developer"),
                    ("gamma-network-engineer", "Gamma Hiring Network Engineer"),
                ],
                false,
            ),
        )
        .with(
            "/acme-data-analyst/",
            200,
            detail(&[
                "Skills: Python, SQL, AWS",
                "Requirements: 0-2 years of experience.",
                "Location: Nairobi, Kenya",
            ]),
        )
        .with(
            "/beta-web-developer/",
            200,
            detail(&[
                "Skills: React, JavaScript",
                "At least 3 years experience building web apps.",
                "Location: Mombasa",
            ]),
        )
        .with(
            "/gamma-network-engineer/",
            200,
            detail(&["Skills: Linux, Python", "Location: Remote"]),
        )
}

fn config() -> Config {
    let mut config = Config::default();
    config.site.base_url = BASE.into();
    config.crawler.max_retries = 0;
    config.crawler.max_consecutive_failures = 3;
    config
}

async fn crawl(config: &Config, store: &LocalStore, site: Arc<FakeSite>) -> Result<jobmarket::models::RunReport> {
    run_crawler_with_source(
        config,
        store,
        site,
        &CrawlParams::default(),
        Arc::new(AtomicBool::new(false)),
    )
    .await
}

async fn export_and_process(config: &Config, store: &LocalStore, dir: &Path) {
    let raw = config.paths.resolve(dir, &config.paths.raw_export);
    run_export(store, &raw).await.unwrap();
    run_process(config, dir).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn crawl_export_process_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config();
    let store = LocalStore::open(dir.path()).await.unwrap();

    let report = crawl(&config, &store, Arc::new(three_job_site())).await.unwrap();
    assert_eq!(report.new_records, 3);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.failed, 0);

    export_and_process(&config, &store, dir.path()).await;

    let processed = read_processed(&config.paths.resolve(dir.path(), &config.paths.processed))
        .await
        .unwrap();
    assert_eq!(processed.len(), 3);

    let acme = processed
        .iter()
        .find(|row| row.title == "Acme Hiring Data Analyst")
        .unwrap();
    assert_eq!(acme.experience_level, "Entry");
    assert_eq!(acme.experience_years_min, Some(0));
    assert_eq!(acme.experience_years_max, Some(2));
    assert_eq!(acme.location_canonical, "Nairobi");
    assert_eq!(acme.skill_list(), ["AWS", "Python", "SQL"]);
    assert_eq!(acme.job_title_clean, "Data Analyst");

    let stats = read_stats(&config.paths.resolve(dir.path(), &config.paths.stats))
        .await
        .unwrap();
    let count = |kind: &str, a: &str, b: &str| {
        stats
            .iter()
            .find(|row| row.kind == kind && row.skill_1 == a && row.skill_2 == b)
            .map(|row| row.count)
    };

    assert_eq!(count("total_jobs", "", ""), Some(3));
    assert_eq!(count("frequency", "Python", ""), Some(2));
    assert_eq!(count("frequency", "SQL", ""), Some(1));
    assert_eq!(count("cooccurrence", "Python", "SQL"), Some(1));
    assert_eq!(count("cooccurrence", "AWS", "Python"), Some(1));
    assert_eq!(count("cooccurrence", "AWS", "SQL"), Some(1));
    assert_eq!(count("cooccurrence", "Linux", "Python"), Some(1));
    // Pairs are stored once, in name order.
    assert_eq!(count("cooccurrence", "SQL", "Python"), None);
    assert_eq!(count("cooccurrence", "Python", "Python"), None);
}

#[tokio::test(start_paused = true)]
async fn rerun_adds_no_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = config();
    let store = LocalStore::open(dir.path()).await.unwrap();

    crawl(&config, &store, Arc::new(three_job_site())).await.unwrap();
    let site = Arc::new(three_job_site());
    let second = crawl(&config, &store, Arc::clone(&site)).await.unwrap();

    assert_eq!(second.new_records, 0);
    assert_eq!(second.refreshed, 3);
    assert_eq!(second.fetched, 0);
    assert!(site.requested().iter().all(|url| !url.contains("-analyst/")));

    let all = store.export_all().await.unwrap();
    let fingerprints: HashSet<_> = all.iter().map(|p| p.fingerprint.as_str()).collect();
    assert_eq!(all.len(), 3);
    assert_eq!(fingerprints.len(), 3);
    assert_eq!(store.load_runs().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn consecutive_failures_abort_and_keep_committed_records() {
    let dir = TempDir::new().unwrap();
    let config = config();
    let store = LocalStore::open(dir.path()).await.unwrap();

    let rows = [
        ("ok-1", "Acme Hiring Data Analyst"),
        ("ok-2", "Beta Hiring Web Developer"),
        ("down-1", "Delta Hiring QA Tester"),
        ("down-2", "Echo Hiring Support Officer"),
        ("down-3", "Foxtrot Hiring Cloud Engineer"),
        ("down-4", "Golf Hiring Data Engineer"),
        ("down-5", "Hotel Hiring Security Analyst"),
    ];
    let mut site = FakeSite::default()
        .with("/category/internships/", 200, listing(&rows, false))
        .with("/ok-1/", 200, detail(&["Skills: Python"]))
        .with("/ok-2/", 200, detail(&["Skills: React"]));
    for n in 1..=5 {
        site = site.with(&format!("/down-{n}/"), 503, "Service Unavailable");
    }
    let site = Arc::new(site);

    let err = crawl(&config, &store, Arc::clone(&site)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::CrawlAborted {
            consecutive_failures: 3,
            threshold: 3
        }
    ));

    assert_eq!(store.len().await.unwrap(), 2);
    let requested = site.requested();
    assert!(requested.iter().any(|url| url.ends_with("/down-3/")));
    assert!(!requested.iter().any(|url| url.ends_with("/down-4/")));

    let runs = store.load_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].stop_reason, StopReason::Aborted);
    assert_eq!(runs[0].failed, 3);
    assert_eq!(runs[0].new_records, 2);
}

#[tokio::test(start_paused = true)]
async fn requests_respect_crawl_delay() {
    let dir = TempDir::new().unwrap();
    let config = config();
    let store = LocalStore::open(dir.path()).await.unwrap();

    let site = Arc::new(
        three_job_site().with("/robots.txt", 200, "User-agent: *\nCrawl-delay: 3\nDisallow: /wp-admin/\n"),
    );
    crawl(&config, &store, Arc::clone(&site)).await.unwrap();

    let times = site.request_times();
    // robots.txt, one listing page, three detail pages
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(3));
    }
}

#[tokio::test(start_paused = true)]
async fn disallowed_details_are_never_requested() {
    let dir = TempDir::new().unwrap();
    let config = config();
    let store = LocalStore::open(dir.path()).await.unwrap();

    let site = Arc::new(
        FakeSite::default()
            .with("/robots.txt", 200, "User-agent: *\nDisallow: /private/\n")
            .with(
                "/category/internships/",
                200,
                listing(
                    &[
                        ("private/hidden", "Acme Hiring Data Analyst"),
                        ("open", "Beta Hiring Web Developer"),
                    ],
                    false,
                ),
            )
            .with("/open/", 200, detail(&["Skills: React"])),
    );

    let report = crawl(&config, &store, Arc::clone(&site)).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.new_records, 1);
    assert!(!site.requested().iter().any(|url| url.contains("/private/")));
}
