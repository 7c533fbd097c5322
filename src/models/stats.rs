//! Skill extraction results and the aggregate statistics derived from them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{DomainCategory, EducationLevel, ExperienceLevel};

/// Canonical skills found in one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillExtraction {
    pub fingerprint: String,
    pub skills: BTreeSet<String>,
}

impl SkillExtraction {
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Unordered skill pair, stored with the lexically smaller name first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SkillPair(String, String);

impl SkillPair {
    /// `None` for a skill paired with itself.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self(a.to_string(), b.to_string())),
            std::cmp::Ordering::Greater => Some(Self(b.to_string(), a.to_string())),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }
}

/// Counts over the whole processed set. Always recomputed from scratch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_jobs: usize,
    pub frequency: BTreeMap<String, usize>,
    pub cooccurrence: BTreeMap<SkillPair, usize>,
    /// Co-occurrence restricted to skills outside `soft_skills`
    pub hard_cooccurrence: BTreeMap<SkillPair, usize>,
    pub by_experience: BTreeMap<(String, ExperienceLevel), usize>,
    pub by_domain: BTreeMap<(String, DomainCategory), usize>,
    pub by_experience_domain: BTreeMap<(String, ExperienceLevel, DomainCategory), usize>,
    pub experience_distribution: BTreeMap<ExperienceLevel, usize>,
    pub education_distribution: BTreeMap<EducationLevel, usize>,
    pub domain_distribution: BTreeMap<DomainCategory, usize>,
}

impl AggregateStats {
    /// Number of jobs mentioning `skill`.
    pub fn frequency_of(&self, skill: &str) -> usize {
        self.frequency.get(skill).copied().unwrap_or(0)
    }

    /// Jobs mentioning both skills; `None` when `a == b`.
    pub fn cooccurrence_of(&self, a: &str, b: &str) -> Option<usize> {
        let pair = SkillPair::new(a, b)?;
        Some(self.cooccurrence.get(&pair).copied().unwrap_or(0))
    }

    /// Share of all jobs mentioning `skill`, in percent.
    pub fn pct_of_total(&self, skill: &str) -> f64 {
        percent(self.frequency_of(skill), self.total_jobs)
    }

    /// Pair count as a percentage of the rarer skill's frequency.
    pub fn pair_pct(&self, pair: &SkillPair, count: usize) -> f64 {
        let rarer = self
            .frequency_of(pair.first())
            .min(self.frequency_of(pair.second()));
        percent(count, rarer)
    }

    /// Skills by descending frequency, ties broken by name.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<_> = self
            .frequency
            .iter()
            .map(|(skill, count)| (skill.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 10_000.0).round() / 100.0
    }
}
