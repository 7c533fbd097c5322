//! Raw job posting records as captured from the site.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `<Company> [is] Hiring[:] <Role>`
static HIRING_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.+?)\s+(?:is\s+)?hiring\b\s*:?\s*(.*)$").expect("valid regex")
});

/// `<Role> open at <Company>`
static OPEN_AT_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.+?)\s+(?:job\s+)?(?:opening|openings|vacancy|vacancies|open)\s+at\s+(.+?)\s*$")
        .expect("valid regex")
});

/// Split a listing title into `(company, role)` using the site's title
/// conventions. Either part may be empty when no pattern matches.
pub fn split_title(title: &str) -> (String, String) {
    if let Some(caps) = HIRING_TITLE.captures(title) {
        let company = caps[1].trim().to_string();
        let role = caps.get(2).map_or("", |m| m.as_str()).trim();
        return (company, role.to_string());
    }
    if let Some(caps) = OPEN_AT_TITLE.captures(title) {
        return (caps[2].trim().to_string(), caps[1].trim().to_string());
    }
    (String::new(), title.trim().to_string())
}

/// Company named by the title, if the title follows a known pattern.
pub fn company_from_title(title: &str) -> Option<String> {
    let (company, _) = split_title(title);
    (!company.is_empty()).then_some(company)
}

/// A listing row as it appears on a listing/search page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub source_url: String,
    pub title: String,
    /// Company derived from the title, empty if no pattern matched
    pub company_raw: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl ListingRow {
    /// Fingerprint computable before the detail page is fetched.
    pub fn fingerprint(&self) -> String {
        JobPosting::fingerprint_of(&self.source_url, &self.title, &self.company_raw)
    }
}

/// Fields only available on the detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDetail {
    pub description_text: String,
    pub location_raw: String,
    pub experience_text: String,
    pub education_text: String,
    pub tags: Vec<String>,
}

/// A raw job posting.
///
/// Content fields are immutable once stored; only `last_seen_at`
/// moves forward on re-crawls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobPosting {
    pub fingerprint: String,
    pub title: String,
    pub company_raw: String,
    pub location_raw: String,
    pub description_text: String,
    #[serde(default)]
    pub tags_raw: Vec<String>,
    #[serde(default)]
    pub experience_text: String,
    #[serde(default)]
    pub education_text: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub source_url: String,
}

impl JobPosting {
    /// Stable SHA-256 over (source_url, title, company_raw).
    ///
    /// Fields are separated by U+001F so that shifting text between
    /// fields changes the hash.
    pub fn fingerprint_of(source_url: &str, title: &str, company_raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_url.as_bytes());
        hasher.update([0x1f]);
        hasher.update(title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(company_raw.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Build the full record from a listing row and its detail page.
    pub fn from_parts(row: ListingRow, detail: JobDetail, fetched_at: DateTime<Utc>) -> Self {
        let fingerprint = row.fingerprint();
        let mut tags_raw = row.tags;
        for tag in detail.tags {
            if !tags_raw.contains(&tag) {
                tags_raw.push(tag);
            }
        }

        Self {
            fingerprint,
            title: row.title,
            company_raw: row.company_raw,
            location_raw: detail.location_raw,
            description_text: detail.description_text,
            tags_raw,
            experience_text: detail.experience_text,
            education_text: detail.education_text,
            posted_at: row.posted_at,
            fetched_at,
            last_seen_at: fetched_at,
            source_url: row.source_url,
        }
    }

    /// Recompute the fingerprint from the identifying fields.
    pub fn computed_fingerprint(&self) -> String {
        Self::fingerprint_of(&self.source_url, &self.title, &self.company_raw)
    }
}
