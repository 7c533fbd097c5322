//! Normalized job records and their closed vocabularies.
//!
//! The string forms of the enums below are part of the processed output
//! contract; the dashboard binds to them by name.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Required experience bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Internship,
    Entry,
    Mid,
    Senior,
    Unspecified,
}

impl ExperienceLevel {
    pub const ALL: [Self; 5] = [
        Self::Internship,
        Self::Entry,
        Self::Mid,
        Self::Senior,
        Self::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internship => "Internship",
            Self::Entry => "Entry",
            Self::Mid => "Mid",
            Self::Senior => "Senior",
            Self::Unspecified => "Unspecified",
        }
    }
}

/// Minimum education requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    None,
    Diploma,
    Bachelor,
    Unspecified,
}

impl EducationLevel {
    pub const ALL: [Self; 4] = [Self::None, Self::Diploma, Self::Bachelor, Self::Unspecified];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Diploma => "Diploma",
            Self::Bachelor => "Bachelor",
            Self::Unspecified => "Unspecified",
        }
    }
}

/// Closed set of job domains. Rule tables can only point at these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DomainCategory {
    #[serde(rename = "Data Science")]
    DataScience,
    #[serde(rename = "Web Dev")]
    WebDev,
    #[serde(rename = "Cyber Security")]
    CyberSecurity,
    #[serde(rename = "Network & Systems")]
    NetworkSystems,
    Unspecified,
}

impl DomainCategory {
    pub const ALL: [Self; 5] = [
        Self::DataScience,
        Self::WebDev,
        Self::CyberSecurity,
        Self::NetworkSystems,
        Self::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataScience => "Data Science",
            Self::WebDev => "Web Dev",
            Self::CyberSecurity => "Cyber Security",
            Self::NetworkSystems => "Network & Systems",
            Self::Unspecified => "Unspecified",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(ExperienceLevel, EducationLevel, DomainCategory, MatchKind);

/// How a free-text value reached its canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Alias,
    Exact,
    Fuzzy,
    /// No rule matched; the value is the trimmed input
    Unmatched,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alias => "alias",
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Unmatched => "unmatched",
        }
    }
}

/// A canonicalized value with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canonical {
    pub value: String,
    pub matched: MatchKind,
}

impl Canonical {
    pub fn new(value: impl Into<String>, matched: MatchKind) -> Self {
        Self {
            value: value.into(),
            matched,
        }
    }

    pub fn unmatched(value: impl Into<String>) -> Self {
        Self::new(value, MatchKind::Unmatched)
    }

    pub fn is_unmatched(&self) -> bool {
        self.matched == MatchKind::Unmatched
    }
}

/// A normalized job, derived purely from one `JobPosting` and the
/// current rule tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedJob {
    pub fingerprint: String,
    pub title: String,
    pub job_title_clean: String,
    pub description_text: String,
    pub company: Canonical,
    pub location: Canonical,
    pub tags_canonical: BTreeSet<String>,
    pub domain_category: DomainCategory,
    pub experience_level: ExperienceLevel,
    pub experience_years_min: Option<u32>,
    pub experience_years_max: Option<u32>,
    pub education_required: EducationLevel,
    pub posted_at: Option<DateTime<Utc>>,
    pub source_url: String,
}
