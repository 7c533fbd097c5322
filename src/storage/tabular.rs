//! Flat CSV files: raw export, processed jobs and aggregate statistics.
//!
//! Column sets and enum labels here are what the dashboard binds to.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{AggregateStats, CleanedJob, JobPosting, SkillExtraction, percent};
use crate::storage::write_atomic;

const LIST_SEPARATOR: &str = ";";

fn join(items: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn split(joined: &str) -> Vec<String> {
    joined
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// One row of `raw/jobs.csv`.
#[derive(Debug, Serialize, Deserialize)]
struct RawRow {
    fingerprint: String,
    title: String,
    company_raw: String,
    location_raw: String,
    description_text: String,
    tags_raw: String,
    experience_text: String,
    education_text: String,
    posted_at: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    source_url: String,
}

impl From<&JobPosting> for RawRow {
    fn from(p: &JobPosting) -> Self {
        Self {
            fingerprint: p.fingerprint.clone(),
            title: p.title.clone(),
            company_raw: p.company_raw.clone(),
            location_raw: p.location_raw.clone(),
            description_text: p.description_text.clone(),
            tags_raw: join(&p.tags_raw),
            experience_text: p.experience_text.clone(),
            education_text: p.education_text.clone(),
            posted_at: p.posted_at,
            fetched_at: p.fetched_at,
            last_seen_at: p.last_seen_at,
            source_url: p.source_url.clone(),
        }
    }
}

impl RawRow {
    fn into_posting(self) -> Result<JobPosting> {
        if self.source_url.trim().is_empty() || self.title.trim().is_empty() {
            return Err(AppError::validation("row without source_url or title"));
        }
        let mut posting = JobPosting {
            fingerprint: self.fingerprint,
            title: self.title,
            company_raw: self.company_raw,
            location_raw: self.location_raw,
            description_text: self.description_text,
            tags_raw: split(&self.tags_raw),
            experience_text: self.experience_text,
            education_text: self.education_text,
            posted_at: self.posted_at,
            fetched_at: self.fetched_at,
            last_seen_at: self.last_seen_at,
            source_url: self.source_url,
        };
        if posting.fingerprint.is_empty() {
            posting.fingerprint = posting.computed_fingerprint();
        }
        Ok(posting)
    }
}

/// One row of `processed/jobs_cleaned.csv`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub fingerprint: String,
    pub title: String,
    pub job_title_clean: String,
    pub company_canonical: String,
    pub company_match: String,
    pub location_canonical: String,
    pub location_match: String,
    pub tags_canonical: String,
    pub domain_category: String,
    pub experience_level: String,
    pub experience_years_min: Option<u32>,
    pub experience_years_max: Option<u32>,
    pub education_required: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub source_url: String,
    pub skills: String,
    pub skill_count: usize,
}

impl ProcessedRow {
    pub fn new(job: &CleanedJob, extraction: &SkillExtraction) -> Self {
        Self {
            fingerprint: job.fingerprint.clone(),
            title: job.title.clone(),
            job_title_clean: job.job_title_clean.clone(),
            company_canonical: job.company.value.clone(),
            company_match: job.company.matched.to_string(),
            location_canonical: job.location.value.clone(),
            location_match: job.location.matched.to_string(),
            tags_canonical: join(&job.tags_canonical),
            domain_category: job.domain_category.to_string(),
            experience_level: job.experience_level.to_string(),
            experience_years_min: job.experience_years_min,
            experience_years_max: job.experience_years_max,
            education_required: job.education_required.to_string(),
            posted_at: job.posted_at,
            source_url: job.source_url.clone(),
            skills: join(&extraction.skills),
            skill_count: extraction.len(),
        }
    }

    /// Skill names of this row.
    pub fn skill_list(&self) -> Vec<String> {
        split(&self.skills)
    }
}

/// One row of `processed/aggregate_stats.csv`.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsRow {
    pub kind: String,
    pub skill_1: String,
    pub skill_2: String,
    pub experience_level: String,
    pub domain_category: String,
    pub education_required: String,
    pub count: usize,
    pub pct: f64,
}

impl StatsRow {
    fn new(kind: &str, count: usize, pct: f64) -> Self {
        Self {
            kind: kind.to_string(),
            count,
            pct,
            ..Self::default()
        }
    }
}

/// Flatten aggregates into long-format rows.
///
/// Cross-tab percentages are relative to the skill's frequency; pair
/// percentages to the rarer skill; everything else to all jobs.
pub fn stats_rows(stats: &AggregateStats) -> Vec<StatsRow> {
    let mut rows = vec![StatsRow::new("total_jobs", stats.total_jobs, 100.0)];

    for (skill, count) in stats.ranked() {
        rows.push(StatsRow {
            skill_1: skill.to_string(),
            ..StatsRow::new("frequency", count, stats.pct_of_total(skill))
        });
    }

    for (kind, table) in [("cooccurrence", &stats.cooccurrence), ("hard_cooccurrence", &stats.hard_cooccurrence)] {
        for (pair, count) in table {
            rows.push(StatsRow {
                skill_1: pair.first().to_string(),
                skill_2: pair.second().to_string(),
                ..StatsRow::new(kind, *count, stats.pair_pct(pair, *count))
            });
        }
    }

    for ((skill, level), count) in &stats.by_experience {
        rows.push(StatsRow {
            skill_1: skill.clone(),
            experience_level: level.to_string(),
            ..StatsRow::new("skill_experience", *count, percent(*count, stats.frequency_of(skill)))
        });
    }
    for ((skill, domain), count) in &stats.by_domain {
        rows.push(StatsRow {
            skill_1: skill.clone(),
            domain_category: domain.to_string(),
            ..StatsRow::new("skill_domain", *count, percent(*count, stats.frequency_of(skill)))
        });
    }
    for ((skill, level, domain), count) in &stats.by_experience_domain {
        rows.push(StatsRow {
            skill_1: skill.clone(),
            experience_level: level.to_string(),
            domain_category: domain.to_string(),
            ..StatsRow::new(
                "skill_experience_domain",
                *count,
                percent(*count, stats.frequency_of(skill)),
            )
        });
    }

    for (level, count) in &stats.experience_distribution {
        rows.push(StatsRow {
            experience_level: level.to_string(),
            ..StatsRow::new("experience_distribution", *count, percent(*count, stats.total_jobs))
        });
    }
    for (level, count) in &stats.education_distribution {
        rows.push(StatsRow {
            education_required: level.to_string(),
            ..StatsRow::new("education_distribution", *count, percent(*count, stats.total_jobs))
        });
    }
    for (domain, count) in &stats.domain_distribution {
        rows.push(StatsRow {
            domain_category: domain.to_string(),
            ..StatsRow::new("domain_distribution", *count, percent(*count, stats.total_jobs))
        });
    }

    rows
}

fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| AppError::Io(e.into_error()))
}

/// Write the raw export, one row per posting.
pub async fn write_raw(path: &Path, postings: &[JobPosting]) -> Result<()> {
    let bytes = to_csv(postings.iter().map(RawRow::from))?;
    write_atomic(path, &bytes).await
}

/// Read the raw export. Malformed rows are logged and skipped; the second
/// value counts them.
pub async fn read_raw(path: &Path) -> Result<(Vec<JobPosting>, usize)> {
    let bytes = tokio::fs::read(path).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());

    let mut postings = Vec::new();
    let mut malformed = 0;
    for (index, row) in reader.deserialize::<RawRow>().enumerate() {
        match row.map_err(AppError::from).and_then(RawRow::into_posting) {
            Ok(posting) => postings.push(posting),
            Err(e) => {
                malformed += 1;
                log::warn!("Skipping malformed row {} in {}: {}", index + 2, path.display(), e);
            }
        }
    }

    Ok((postings, malformed))
}

pub async fn write_processed(path: &Path, jobs: &[(CleanedJob, SkillExtraction)]) -> Result<()> {
    let bytes = to_csv(jobs.iter().map(|(job, skills)| ProcessedRow::new(job, skills)))?;
    write_atomic(path, &bytes).await
}

pub async fn read_processed(path: &Path) -> Result<Vec<ProcessedRow>> {
    let bytes = tokio::fs::read(path).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let rows: Vec<ProcessedRow> = reader.deserialize().collect::<std::result::Result<_, csv::Error>>()?;
    Ok(rows)
}

pub async fn write_stats(path: &Path, stats: &AggregateStats) -> Result<()> {
    let bytes = to_csv(stats_rows(stats))?;
    write_atomic(path, &bytes).await
}

pub async fn read_stats(path: &Path) -> Result<Vec<StatsRow>> {
    let bytes = tokio::fs::read(path).await?;
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let rows: Vec<StatsRow> = reader.deserialize().collect::<std::result::Result<_, csv::Error>>()?;
    Ok(rows)
}
