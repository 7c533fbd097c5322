// src/services/site.rs

//! Adapter for the target job board.
//!
//! Builds listing URLs for both crawl modes and extracts listing rows and
//! job details from the board's WordPress markup using the configured
//! selectors.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlMode, JobDetail, ListingRow, SiteConfig, company_from_title};
use crate::services::RawPage;
use crate::utils::text::{contains_term, normalize_whitespace};

static LOCATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:job\s+|work\s+|duty\s+)?(?:location|station)\s*[:\-–]\s*(.+)$").expect("valid regex")
});

static EXPERIENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d{1,2}\s*(?:(?:-|–|to)\s*\d{1,2})?\s*\+?\s*(?:years?|yrs?)(?:\s+of)?(?:\s+(?:relevant|work|working|professional|proven|hands-on))?\s+experience",
    )
    .expect("valid regex")
});

static EDUCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:degree|diploma|bachelor|masters?|certificate|kcse|undergraduate|graduate|b\.?\s?sc)\b")
        .expect("valid regex")
});

/// Date formats seen in listing metadata, besides RFC 3339.
const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%d/%m/%Y", "%d %B %Y"];

/// Block elements whose text forms one line of a description.
const BLOCKS: &str = "p, li, h1, h2, h3, h4, h5, h6, td, dd, dt";

/// A position in the listing space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    /// `/category/<slug>/page/<n>/`
    Category { slug: String, page: u32 },
    /// `/?s=<query>&paged=<n>`
    Search { query: String, page: u32 },
}

impl PageRef {
    /// Page 1 of the listing a crawl mode walks.
    pub fn first(mode: &CrawlMode, category: &str) -> Self {
        match mode {
            CrawlMode::Internships => Self::Category {
                slug: category.to_string(),
                page: 1,
            },
            CrawlMode::Search { query } => Self::Search {
                query: query.clone(),
                page: 1,
            },
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Self::Category { page, .. } | Self::Search { page, .. } => *page,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Category { slug, page } => Self::Category {
                slug: slug.clone(),
                page: page + 1,
            },
            Self::Search { query, page } => Self::Search {
                query: query.clone(),
                page: page + 1,
            },
        }
    }

    /// Absolute URL of this page on `base`.
    pub fn url(&self, base: &Url) -> Result<Url> {
        match self {
            Self::Category { slug, page: 1 } => Ok(base.join(&format!("/category/{slug}/"))?),
            Self::Category { slug, page } => Ok(base.join(&format!("/category/{slug}/page/{page}/"))?),
            Self::Search { query, page } => {
                let mut url = base.join("/")?;
                {
                    let mut pairs = url.query_pairs_mut();
                    pairs.append_pair("s", query);
                    if *page > 1 {
                        pairs.append_pair("paged", &page.to_string());
                    }
                }
                Ok(url)
            }
        }
    }
}

/// Rows found on one listing page.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub rows: Vec<ListingRow>,
    /// Rows dropped by title filters
    pub skipped: usize,
    pub has_next: bool,
}

struct Selectors {
    row: Selector,
    title: Selector,
    date: Selector,
    tags: Selector,
    next_page: Selector,
    body: Selector,
    blocks: Selector,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// Parser for the target board's pages.
pub struct JobSite {
    base_url: Url,
    category: String,
    skip_keywords: Vec<String>,
    location_phrases: Vec<String>,
    selectors: Selectors,
}

impl JobSite {
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let s = &config.selectors;
        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            category: config.internship_category.clone(),
            skip_keywords: config.skip_title_keywords.iter().map(|k| k.to_lowercase()).collect(),
            location_phrases: config.location_phrases.clone(),
            selectors: Selectors {
                row: parse_selector(&s.row)?,
                title: parse_selector(&s.title)?,
                date: parse_selector(&s.date)?,
                tags: parse_selector(&s.tags)?,
                next_page: parse_selector(&s.next_page)?,
                body: parse_selector(&s.body)?,
                blocks: parse_selector(BLOCKS)?,
            },
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// First page of the listing for `mode`.
    pub fn first_page(&self, mode: &CrawlMode) -> PageRef {
        PageRef::first(mode, &self.category)
    }

    fn is_skipped(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.skip_keywords.iter().any(|k| title.contains(k.as_str()))
    }

    /// Extract listing rows, in page order and without duplicates.
    pub fn parse_listing(&self, page: &RawPage) -> ListingPage {
        let document = Html::parse_document(&page.body);
        let mut listing = ListingPage {
            has_next: document.select(&self.selectors.next_page).next().is_some(),
            ..ListingPage::default()
        };
        let mut seen = HashSet::new();

        for row in document.select(&self.selectors.row) {
            let Some(link) = row.select(&self.selectors.title).next() else {
                continue;
            };
            let title = element_text(link);
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Ok(url) = page.url.join(href) else {
                log::debug!("Skipping row with unparsable link {href:?}");
                continue;
            };
            if title.is_empty() || !seen.insert(url.to_string()) {
                continue;
            }
            if self.is_skipped(&title) {
                log::debug!("Skipping non-job row: {title}");
                listing.skipped += 1;
                continue;
            }

            let posted_at = row.select(&self.selectors.date).next().and_then(|date| {
                date.value()
                    .attr("datetime")
                    .and_then(parse_date)
                    .or_else(|| parse_date(&element_text(date)))
            });

            listing.rows.push(ListingRow {
                source_url: url.to_string(),
                company_raw: company_from_title(&title).unwrap_or_default(),
                title,
                posted_at,
                tags: collect_tags(row.select(&self.selectors.tags)),
            });
        }

        listing
    }

    /// Extract description, tags and requirement snippets from a job page.
    pub fn parse_detail(&self, page: &RawPage) -> JobDetail {
        let document = Html::parse_document(&page.body);

        let description_text = match document.select(&self.selectors.body).next() {
            Some(body) => self.description_lines(body).join("\n"),
            None => String::new(),
        };

        JobDetail {
            location_raw: self.find_location(&description_text),
            experience_text: find_experience(&description_text),
            education_text: find_education(&description_text),
            tags: collect_tags(document.select(&self.selectors.tags)),
            description_text,
        }
    }

    fn description_lines(&self, body: ElementRef<'_>) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        for block in body.select(&self.selectors.blocks) {
            let line = element_text(block);
            if !line.is_empty() && lines.last() != Some(&line) {
                lines.push(line);
            }
        }
        if lines.is_empty() {
            let text = element_text(body);
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// A `Location:` line, else the first known place named in the text.
    fn find_location(&self, description: &str) -> String {
        for line in description.lines() {
            if let Some(caps) = LOCATION_LINE.captures(line) {
                let value: String = caps[1].trim().chars().take(80).collect();
                if !value.is_empty() {
                    return value;
                }
            }
        }

        let lower = description.to_lowercase();
        self.location_phrases
            .iter()
            .filter_map(|phrase| {
                let needle = phrase.to_lowercase();
                if !contains_term(&lower, &needle) {
                    return None;
                }
                lower.find(needle.as_str()).map(|at| (at, phrase))
            })
            .min_by_key(|(at, _)| *at)
            .map(|(_, phrase)| phrase.clone())
            .unwrap_or_default()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn collect_tags<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in elements.map(element_text) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// The first "N[-M] years ... experience" phrase, else the first line
/// that talks about experience.
fn find_experience(description: &str) -> String {
    if let Some(found) = EXPERIENCE.find(description) {
        return found.as_str().to_string();
    }
    description
        .lines()
        .find(|line| line.to_lowercase().contains("experience"))
        .map(|line| line.chars().take(200).collect())
        .unwrap_or_default()
}

/// The first sentence naming a qualification.
fn find_education(description: &str) -> String {
    description
        .lines()
        .flat_map(|line| line.split(". "))
        .find(|sentence| EDUCATION.is_match(sentence))
        .map(|sentence| sentence.trim().chars().take(300).collect())
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
