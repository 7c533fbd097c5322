// src/services/skills.rs

//! Skill extraction and aggregate statistics.

use std::collections::BTreeSet;

use crate::models::{AggregateStats, CleanedJob, SkillExtraction, SkillPair, SkillTaxonomy};
use crate::utils::text::contains_term;

/// Canonical skills mentioned in a job's title, description or tags.
///
/// Surface forms are matched case-insensitively on term boundaries and
/// resolved to their canonical skill. No match yields an empty set.
pub fn extract(job: &CleanedJob, taxonomy: &SkillTaxonomy) -> SkillExtraction {
    let mut text = String::with_capacity(job.title.len() + job.description_text.len() + 64);
    text.push_str(&job.title);
    text.push('\n');
    text.push_str(&job.description_text);
    for tag in &job.tags_canonical {
        text.push('\n');
        text.push_str(tag);
    }
    let text = text.to_lowercase();

    let skills = taxonomy
        .surface_forms()
        .iter()
        .filter(|(form, _)| contains_term(&text, form))
        .map(|(_, name)| name.clone())
        .collect();

    SkillExtraction {
        fingerprint: job.fingerprint.clone(),
        skills,
    }
}

/// Recompute every aggregate from the full processed set.
///
/// Only depends on its inputs; iteration order of `jobs` does not matter.
pub fn aggregate(jobs: &[(CleanedJob, SkillExtraction)], taxonomy: &SkillTaxonomy) -> AggregateStats {
    let mut stats = AggregateStats {
        total_jobs: jobs.len(),
        ..AggregateStats::default()
    };

    for (job, extraction) in jobs {
        let experience = job.experience_level;
        let domain = job.domain_category;

        *stats.experience_distribution.entry(experience).or_default() += 1;
        *stats.education_distribution.entry(job.education_required).or_default() += 1;
        *stats.domain_distribution.entry(domain).or_default() += 1;

        // Names outside the taxonomy cannot be counted.
        let skills: BTreeSet<&String> = extraction
            .skills
            .iter()
            .filter(|skill| taxonomy.contains(skill))
            .collect();

        for &skill in &skills {
            *stats.frequency.entry(skill.clone()).or_default() += 1;
            *stats.by_experience.entry((skill.clone(), experience)).or_default() += 1;
            *stats.by_domain.entry((skill.clone(), domain)).or_default() += 1;
            *stats
                .by_experience_domain
                .entry((skill.clone(), experience, domain))
                .or_default() += 1;
        }

        let ordered: Vec<&String> = skills.into_iter().collect();
        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                let Some(pair) = SkillPair::new(a, b) else {
                    continue;
                };
                if !taxonomy.is_soft_skill(a) && !taxonomy.is_soft_skill(b) {
                    *stats.hard_cooccurrence.entry(pair.clone()).or_default() += 1;
                }
                *stats.cooccurrence.entry(pair).or_default() += 1;
            }
        }
    }

    stats
}
