// src/pipeline/process.rs

//! Processing stage: raw export → normalized jobs, skills and statistics.
//!
//! Jobs are independent of each other, so normalization and extraction run
//! on the rayon pool against read-only rule tables. The aggregate pass
//! always starts from scratch.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::Result;
use crate::models::{CleanedJob, Config, JobPosting, NormalizationRules, SkillExtraction, SkillTaxonomy};
use crate::services::{Normalizer, skills};
use crate::storage::tabular;
use crate::utils::log::summary;

/// Counts reported by a processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub jobs: usize,
    /// Raw rows that could not be read
    pub malformed: usize,
    pub unmatched_companies: usize,
    pub unmatched_locations: usize,
    pub jobs_without_skills: usize,
    pub distinct_skills: usize,
    pub processed_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Normalize each posting and extract its skills, preserving input order.
pub fn process_postings(
    postings: &[JobPosting],
    normalizer: &Normalizer,
    taxonomy: &SkillTaxonomy,
) -> Vec<(CleanedJob, SkillExtraction)> {
    postings
        .par_iter()
        .map(|posting| {
            let job = normalizer.normalize(posting);
            let extraction = skills::extract(&job, taxonomy);
            (job, extraction)
        })
        .collect()
}

/// Read the raw export and write the processed and statistics files.
pub async fn run_process(config: &Config, storage_dir: &Path) -> Result<ProcessSummary> {
    let paths = &config.paths;
    let rules = NormalizationRules::load_or_builtin(paths.resolve(storage_dir, &paths.rules))?;
    let normalizer = Normalizer::new(&rules)?;
    let taxonomy = SkillTaxonomy::load_or_builtin(paths.resolve(storage_dir, &paths.taxonomy))?;
    log::info!(
        "Rules version {}, taxonomy version {} ({} skills)",
        normalizer.version(),
        taxonomy.version(),
        taxonomy.len()
    );

    let raw_path = paths.resolve(storage_dir, &paths.raw_export);
    let (postings, malformed) = tabular::read_raw(&raw_path).await?;
    log::info!("Read {} posting(s) from {}", postings.len(), raw_path.display());

    let jobs = process_postings(&postings, &normalizer, &taxonomy);
    let stats = skills::aggregate(&jobs, &taxonomy);

    let processed_path = paths.resolve(storage_dir, &paths.processed);
    let stats_path = paths.resolve(storage_dir, &paths.stats);
    tabular::write_processed(&processed_path, &jobs).await?;
    tabular::write_stats(&stats_path, &stats).await?;

    let result = ProcessSummary {
        jobs: jobs.len(),
        malformed,
        unmatched_companies: jobs.iter().filter(|(job, _)| job.company.is_unmatched()).count(),
        unmatched_locations: jobs.iter().filter(|(job, _)| job.location.is_unmatched()).count(),
        jobs_without_skills: jobs.iter().filter(|(_, skills)| skills.is_empty()).count(),
        distinct_skills: stats.frequency.len(),
        processed_path,
        stats_path,
    };

    summary(
        "Process",
        &[
            ("jobs", result.jobs.to_string()),
            ("malformed rows", result.malformed.to_string()),
            ("unmatched companies", result.unmatched_companies.to_string()),
            ("unmatched locations", result.unmatched_locations.to_string()),
            ("jobs without skills", result.jobs_without_skills.to_string()),
            ("distinct skills", result.distinct_skills.to_string()),
            ("processed", result.processed_path.display().to_string()),
            ("stats", result.stats_path.display().to_string()),
        ],
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn posting(n: usize, description: &str) -> JobPosting {
        let url = format!("https://example.com/jobs/{n}/");
        let title = format!("Acme Hiring Data Intern {n}");
        let now = Utc::now();
        JobPosting {
            fingerprint: JobPosting::fingerprint_of(&url, &title, "Acme"),
            title,
            company_raw: "Acme".into(),
            location_raw: "Nairobi, Kenya".into(),
            description_text: description.into(),
            tags_raw: vec!["Internships".into()],
            experience_text: String::new(),
            education_text: String::new(),
            posted_at: None,
            fetched_at: now,
            last_seen_at: now,
            source_url: url,
        }
    }

    #[test]
    fn parallel_processing_keeps_order() {
        let rules = NormalizationRules::builtin().unwrap();
        let normalizer = Normalizer::new(&rules).unwrap();
        let taxonomy = SkillTaxonomy::builtin().unwrap();

        let postings: Vec<_> = (0..64).map(|n| posting(n, "Skills: Python, SQL")).collect();
        let jobs = process_postings(&postings, &normalizer, &taxonomy);

        assert_eq!(jobs.len(), 64);
        for (posting, (job, _)) in postings.iter().zip(&jobs) {
            assert_eq!(posting.fingerprint, job.fingerprint);
        }
    }

    #[tokio::test]
    async fn run_process_writes_both_outputs() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let raw_path = config.paths.resolve(dir.path(), &config.paths.raw_export);
        tabular::write_raw(
            &raw_path,
            &[posting(1, "Skills: Python, SQL"), posting(2, "Great communication skills")],
        )
        .await
        .unwrap();

        let result = run_process(&config, dir.path()).await.unwrap();

        assert_eq!(result.jobs, 2);
        assert_eq!(result.malformed, 0);
        let rows = tabular::read_processed(&result.processed_path).await.unwrap();
        assert_eq!(rows.len(), 2);
        let stats = tabular::read_stats(&result.stats_path).await.unwrap();
        assert!(stats.iter().any(|row| row.kind == "frequency" && row.skill_1 == "Python"));
    }

    #[tokio::test]
    async fn missing_raw_export_fails() {
        let dir = TempDir::new().unwrap();
        assert!(run_process(&Config::default(), dir.path()).await.is_err());
    }
}
