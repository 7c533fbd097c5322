// src/services/politeness.rs

//! Robots exclusion rules and the per-host request spacing they imply.
//!
//! The policy owns the last-request timestamp of every host it has seen.
//! Callers share it by reference; nothing about crawl timing is global.

use std::collections::HashMap;
use std::time::Duration;

use robotstxt::DefaultMatcher;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::models::{CrawlerConfig, PolitenessConfig};
use crate::services::PageSource;

/// Robots rules plus the minimum spacing between requests to one host.
#[derive(Debug)]
pub struct PolitenessPolicy {
    /// robots.txt body; `None` allows every path
    robots: Option<String>,
    agent: String,
    crawl_delay: Duration,
    degraded: bool,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl PolitenessPolicy {
    /// Policy from a robots.txt body, or allow-all when `robots` is `None`.
    ///
    /// The delay is the robots Crawl-delay for `agent` (or `*`), else the
    /// configured default, clamped between the configured floor and ceiling.
    pub fn new(robots: Option<String>, agent: &str, config: &PolitenessConfig) -> Self {
        let declared = robots.as_deref().and_then(|body| parse_crawl_delay(body, agent));
        let delay = declared.unwrap_or(Duration::from_millis(config.default_delay_ms));

        let min = Duration::from_millis(config.min_delay_ms);
        let max = Duration::from_millis(config.max_delay_ms).max(min);
        if delay > max {
            log::warn!(
                "Crawl-delay {:?} exceeds the {} ms ceiling; using the ceiling",
                delay,
                config.max_delay_ms
            );
        }

        Self {
            robots,
            agent: agent.to_string(),
            crawl_delay: delay.clamp(min, max),
            degraded: false,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Conservative policy used when the rules could not be retrieved.
    pub fn degraded(agent: &str, config: &PolitenessConfig) -> Self {
        let delay = config.fallback_delay_ms.max(config.min_delay_ms);
        Self {
            robots: None,
            agent: agent.to_string(),
            crawl_delay: Duration::from_millis(delay),
            degraded: true,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch `/robots.txt` for `base` and build the policy.
    ///
    /// 2xx parses the rules, 4xx means "no rules", anything else degrades.
    pub async fn load(
        source: &dyn PageSource,
        base: &Url,
        crawler: &CrawlerConfig,
        config: &PolitenessConfig,
    ) -> Self {
        let agent = crawler.robots_agent.as_str();
        let robots_url = match base.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot build robots.txt URL for {base}: {e}; using degraded politeness");
                return Self::degraded(agent, config);
            }
        };

        let policy = match source.get(&robots_url).await {
            Ok(page) if page.is_success() => {
                let policy = Self::new(Some(page.body), agent, config);
                log::info!(
                    "Loaded robots.txt from {robots_url}; crawl delay {:?}",
                    policy.crawl_delay
                );
                policy
            }
            Ok(page) if (400..500).contains(&page.status) => {
                log::info!("No robots.txt at {robots_url} (HTTP {}); all paths allowed", page.status);
                Self::new(None, agent, config)
            }
            Ok(page) => {
                log::warn!(
                    "robots.txt at {robots_url} answered HTTP {}; degraded mode, delay {} ms",
                    page.status,
                    config.fallback_delay_ms
                );
                Self::degraded(agent, config)
            }
            Err(e) => {
                log::warn!(
                    "robots.txt at {robots_url} unreachable ({e}); degraded mode, delay {} ms",
                    config.fallback_delay_ms
                );
                Self::degraded(agent, config)
            }
        };

        // The robots request itself counts against the host's spacing.
        policy.mark(&robots_url).await;
        policy
    }

    /// Whether the rules permit fetching `url`.
    pub fn allowed(&self, url: &Url) -> bool {
        match &self.robots {
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.agent, url.as_str())
            }
            None => true,
        }
    }

    pub fn crawl_delay(&self) -> Duration {
        self.crawl_delay
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Wait until a request to `url`'s host is allowed, then claim the slot.
    ///
    /// The host map stays locked while sleeping, so concurrent callers are
    /// served one at a time.
    pub async fn wait_turn(&self, url: &Url) {
        let host = host_key(url);
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = last_request.get(&host) {
            let ready_at = *last + self.crawl_delay;
            if Instant::now() < ready_at {
                log::debug!("Waiting {:?} before next request to {host}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        last_request.insert(host, Instant::now());
    }

    async fn mark(&self, url: &Url) {
        self.last_request.lock().await.insert(host_key(url), Instant::now());
    }
}

fn host_key(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => url.as_str().to_string(),
    }
}

/// Crawl-delay for `agent`, falling back to the `*` group.
///
/// Groups are runs of `User-agent` lines followed by rules; the agent
/// matches a group when its product token starts with the group's name.
fn parse_crawl_delay(body: &str, agent: &str) -> Option<Duration> {
    let agent = agent.to_lowercase();
    let mut group: Vec<String> = Vec::new();
    let mut in_rules = false;
    let mut specific = None;
    let mut wildcard = None;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    group.clear();
                    in_rules = false;
                }
                group.push(value.to_lowercase());
            }
            "crawl-delay" => {
                in_rules = true;
                let Some(delay) = parse_seconds(value) else {
                    continue;
                };
                for name in &group {
                    if name == "*" {
                        wildcard.get_or_insert(delay);
                    } else if !name.is_empty() && agent.starts_with(name.as_str()) {
                        specific.get_or_insert(delay);
                    }
                }
            }
            _ => in_rules = true,
        }
    }

    specific.or(wildcard)
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let seconds: f64 = value.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::source::testing::CannedSource;

    const ROBOTS: &str = "\
User-agent: *
Disallow: /wp-admin/
Crawl-delay: 5

User-agent: jobmarket
Disallow: /private/
Crawl-delay: 3
";

    fn config() -> PolitenessConfig {
        PolitenessConfig {
            default_delay_ms: 2_000,
            fallback_delay_ms: 10_000,
            min_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }

    fn url(path: &str) -> Url {
        Url::parse("https://jobs.example.com").unwrap().join(path).unwrap()
    }

    #[test]
    fn crawl_delay_prefers_specific_group() {
        assert_eq!(parse_crawl_delay(ROBOTS, "jobmarket"), Some(Duration::from_secs(3)));
        assert_eq!(parse_crawl_delay(ROBOTS, "otherbot"), Some(Duration::from_secs(5)));
        assert_eq!(parse_crawl_delay("User-agent: *\nDisallow:", "jobmarket"), None);
    }

    #[test]
    fn delay_has_a_floor_and_a_default() {
        let fast = PolitenessPolicy::new(Some("User-agent: *\nCrawl-delay: 0.2".into()), "jobmarket", &config());
        assert_eq!(fast.crawl_delay(), Duration::from_secs(1));

        let silent = PolitenessPolicy::new(None, "jobmarket", &config());
        assert_eq!(silent.crawl_delay(), Duration::from_secs(2));

        let degraded = PolitenessPolicy::degraded("jobmarket", &config());
        assert!(degraded.is_degraded());
        assert_eq!(degraded.crawl_delay(), Duration::from_secs(10));
    }

    #[test]
    fn oversized_crawl_delay_is_capped() {
        let slow = PolitenessPolicy::new(
            Some("User-agent: *\nCrawl-delay: 864000000\n".into()),
            "jobmarket",
            &config(),
        );
        assert_eq!(slow.crawl_delay(), Duration::from_secs(60));

        let huge = PolitenessPolicy::new(Some("User-agent: *\nCrawl-delay: 1e20\n".into()), "jobmarket", &config());
        assert_eq!(huge.crawl_delay(), Duration::from_secs(2));
    }

    #[test]
    fn unrepresentable_delays_are_ignored() {
        assert_eq!(parse_seconds("1e20"), None);
        assert_eq!(parse_seconds("-3"), None);
        assert_eq!(parse_seconds("NaN"), None);
        assert_eq!(parse_seconds("inf"), None);
        assert_eq!(parse_seconds("2.5"), Some(Duration::from_millis(2_500)));
    }

    #[test]
    fn robots_rules_are_applied_per_agent() {
        let policy = PolitenessPolicy::new(Some(ROBOTS.into()), "jobmarket", &config());
        assert!(policy.allowed(&url("/category/internships/")));
        assert!(!policy.allowed(&url("/private/list")));

        let other = PolitenessPolicy::new(Some(ROBOTS.into()), "otherbot", &config());
        assert!(!other.allowed(&url("/wp-admin/options.php")));
        assert!(other.allowed(&url("/private/list")));
    }

    #[test]
    fn degraded_policy_blocks_nothing() {
        let policy = PolitenessPolicy::degraded("jobmarket", &config());
        assert!(policy.allowed(&url("/wp-admin/")));
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_turns_are_spaced_by_crawl_delay() {
        let policy = PolitenessPolicy::new(None, "jobmarket", &config());
        let target = url("/category/internships/");

        let mut stamps = Vec::new();
        for _ in 0..3 {
            policy.wait_turn(&target).await;
            stamps.push(Instant::now());
        }

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= policy.crawl_delay());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hosts_are_spaced_independently() {
        let policy = PolitenessPolicy::new(None, "jobmarket", &config());
        let a = Url::parse("https://a.example.com/").unwrap();
        let b = Url::parse("https://b.example.com/").unwrap();

        let start = Instant::now();
        policy.wait_turn(&a).await;
        policy.wait_turn(&b).await;
        assert!(Instant::now() - start < policy.crawl_delay());
    }

    #[tokio::test(start_paused = true)]
    async fn load_reads_robots_and_counts_the_request() {
        let source = CannedSource::default().page("https://jobs.example.com/robots.txt", 200, ROBOTS);
        let base = url("/");
        let policy = PolitenessPolicy::load(&source, &base, &CrawlerConfig::default(), &config()).await;

        assert!(!policy.is_degraded());
        assert_eq!(policy.crawl_delay(), Duration::from_secs(3));

        let start = Instant::now();
        policy.wait_turn(&base).await;
        assert!(Instant::now() - start >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn load_degrades_on_server_error() {
        let source = CannedSource::default().page("https://jobs.example.com/robots.txt", 503, "");
        let policy = PolitenessPolicy::load(&source, &url("/"), &CrawlerConfig::default(), &config()).await;
        assert!(policy.is_degraded());
        assert_eq!(policy.crawl_delay(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_robots_allows_everything() {
        let source = CannedSource::default();
        let policy = PolitenessPolicy::load(&source, &url("/"), &CrawlerConfig::default(), &config()).await;
        assert!(!policy.is_degraded());
        assert!(policy.allowed(&url("/wp-admin/")));
        assert_eq!(policy.crawl_delay(), Duration::from_secs(2));
    }
}
