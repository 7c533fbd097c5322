// src/services/normalizer.rs

//! Canonicalization of raw postings against the normalization tables.
//!
//! `Normalizer::normalize` is pure: it reads only the posting and the
//! compiled tables, so the same inputs always give the same `CleanedJob`.
//!
//! ## Precedence
//!
//! Company and location, first hit wins:
//! 1. whole value is a known alias
//! 2. whole value is a canonical member (case-insensitive)
//! 3. a segment (split on `, - / | ( )`) is an alias or canonical member
//! 4. an alias, then a canonical member, occurs as a whole term
//! 5. best fuzzy score at or above the table threshold
//! 6. otherwise the trimmed input, flagged `unmatched`
//!
//! Experience: explicit rules over the requirement and the title, then
//! year bands, then fallback keywords. Education: ordered rules over the
//! requirement text. Domain: ordered keyword rules over the title, then
//! the tags.

use std::collections::{BTreeMap, BTreeSet};

use regex::{Regex, RegexBuilder};

use crate::error::{AppError, Result};
use crate::models::{
    Canonical, CleanedJob, DomainCategory, EducationLevel, ExperienceLevel, JobPosting, LevelRule,
    MatchKind, NormalizationRules, VocabularyTable, split_title,
};
use crate::utils::text::{contains_term, fold, normalize_whitespace, similarity};

/// Placeholder for a missing company or location.
pub const UNKNOWN: &str = "Unknown";

struct Vocabulary {
    threshold: f64,
    canonical: Vec<String>,
    /// lower-case canonical -> canonical
    exact: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
    /// aliases, longest first, for whole-term search
    aliases_by_length: Vec<(String, String)>,
}

impl Vocabulary {
    fn compile(table: &VocabularyTable) -> Self {
        let exact = table
            .canonical
            .iter()
            .map(|c| (fold(c), c.clone()))
            .collect();
        let mut aliases_by_length: Vec<_> = table
            .aliases
            .iter()
            .map(|(alias, target)| (alias.clone(), target.clone()))
            .collect();
        aliases_by_length.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            threshold: table.fuzzy_threshold,
            canonical: table.canonical.clone(),
            exact,
            aliases: table.aliases.clone(),
            aliases_by_length,
        }
    }

    fn lookup(&self, key: &str) -> Option<Canonical> {
        if let Some(target) = self.aliases.get(key) {
            return Some(Canonical::new(target, MatchKind::Alias));
        }
        self.exact
            .get(key)
            .map(|target| Canonical::new(target, MatchKind::Exact))
    }

    fn canonicalize(&self, raw: &str) -> Canonical {
        let value = normalize_whitespace(raw);
        if value.is_empty() {
            return Canonical::unmatched(UNKNOWN);
        }
        let key = value.to_lowercase();

        if let Some(hit) = self.lookup(&key) {
            return hit;
        }

        let segments: Vec<&str> = key
            .split([',', '-', '/', '|', '(', ')'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(hit) = segments.iter().find_map(|segment| self.lookup(segment)) {
            return hit;
        }

        if let Some((_, target)) = self
            .aliases_by_length
            .iter()
            .find(|(alias, _)| contains_term(&key, alias))
        {
            return Canonical::new(target, MatchKind::Alias);
        }
        if let Some((_, target)) = self.exact.iter().find(|(lower, _)| contains_term(&key, lower)) {
            return Canonical::new(target, MatchKind::Exact);
        }

        let candidates = std::iter::once(key.as_str()).chain(segments.iter().copied());
        let best = candidates
            .flat_map(|candidate| {
                self.canonical
                    .iter()
                    .map(move |member| (similarity(candidate, member), member))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((score, member)) = best {
            if score >= self.threshold {
                return Canonical::new(member, MatchKind::Fuzzy);
            }
        }

        Canonical::unmatched(value)
    }
}

struct LevelPatterns<L> {
    level: L,
    patterns: Vec<Regex>,
}

impl<L: Copy> LevelPatterns<L> {
    fn compile(table: &str, rules: &[LevelRule<L>]) -> Result<Vec<Self>> {
        rules
            .iter()
            .map(|rule| {
                Ok(Self {
                    level: rule.level,
                    patterns: rule
                        .patterns
                        .iter()
                        .map(|p| compile_pattern(table, p))
                        .collect::<Result<_>>()?,
                })
            })
            .collect()
    }
}

fn compile_pattern(table: &str, pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::rule(table, format!("'{pattern}': {e}")))
}

fn first_level<L: Copy>(rules: &[LevelPatterns<L>], text: &str) -> Option<L> {
    if text.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| p.is_match(text)))
        .map(|rule| rule.level)
}

/// Normalization tables compiled for matching.
pub struct Normalizer {
    version: String,
    company: Vocabulary,
    location: Vocabulary,
    tag_aliases: BTreeMap<String, String>,
    years: Regex,
    explicit: Vec<LevelPatterns<ExperienceLevel>>,
    bands: Vec<(Option<u32>, ExperienceLevel)>,
    fallback: Vec<LevelPatterns<ExperienceLevel>>,
    education: Vec<LevelPatterns<EducationLevel>>,
    domain: Vec<(DomainCategory, Vec<String>)>,
}

impl Normalizer {
    /// Compile `rules`. Fails only on malformed patterns.
    pub fn new(rules: &NormalizationRules) -> Result<Self> {
        let mut bands: Vec<_> = rules
            .experience
            .bands
            .iter()
            .map(|band| (band.max_years, band.level))
            .collect();
        // Bounded bands ascending, the open band last.
        bands.sort_by_key(|(max, _)| max.unwrap_or(u32::MAX));

        Ok(Self {
            version: rules.version.clone(),
            company: Vocabulary::compile(&rules.company),
            location: Vocabulary::compile(&rules.location),
            tag_aliases: rules
                .tags
                .aliases
                .iter()
                .map(|(k, v)| (fold(k), fold(v)))
                .collect(),
            years: compile_pattern("experience", &rules.experience.years_pattern)?,
            explicit: LevelPatterns::compile("experience", &rules.experience.explicit)?,
            bands,
            fallback: LevelPatterns::compile("experience", &rules.experience.fallback)?,
            education: LevelPatterns::compile("education", &rules.education)?,
            domain: rules
                .domain
                .iter()
                .map(|rule| (rule.category, rule.keywords.iter().map(|k| fold(k)).collect()))
                .collect(),
        })
    }

    /// Version of the tables this normalizer was compiled from.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn normalize(&self, posting: &JobPosting) -> CleanedJob {
        let title = normalize_whitespace(&posting.title);
        let (title_company, role) = split_title(&title);
        let job_title_clean = if role.is_empty() { title.clone() } else { role };

        let company_raw = if posting.company_raw.trim().is_empty() {
            title_company
        } else {
            posting.company_raw.clone()
        };

        let tags_canonical = self.canonical_tags(&posting.tags_raw);
        let (experience_years_min, experience_years_max) = self.years(&posting.experience_text);

        CleanedJob {
            fingerprint: posting.fingerprint.clone(),
            company: self.company.canonicalize(&company_raw),
            location: self.location.canonicalize(&posting.location_raw),
            experience_level: self.experience_level(&posting.experience_text, &title, experience_years_min),
            education_required: self.education_level(&posting.education_text),
            domain_category: self.domain_category(&title, &tags_canonical),
            tags_canonical,
            experience_years_min,
            experience_years_max,
            job_title_clean,
            title,
            description_text: posting.description_text.clone(),
            posted_at: posting.posted_at,
            source_url: posting.source_url.clone(),
        }
    }

    pub fn canonical_company(&self, raw: &str) -> Canonical {
        self.company.canonicalize(raw)
    }

    pub fn canonical_location(&self, raw: &str) -> Canonical {
        self.location.canonicalize(raw)
    }

    fn canonical_tags(&self, tags: &[String]) -> BTreeSet<String> {
        tags.iter()
            .map(|tag| fold(tag))
            .filter(|tag| !tag.is_empty())
            .map(|tag| self.tag_aliases.get(&tag).cloned().unwrap_or(tag))
            .collect()
    }

    fn years(&self, text: &str) -> (Option<u32>, Option<u32>) {
        let Some(caps) = self.years.captures(text) else {
            return (None, None);
        };
        let min = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let max = caps.get(2).and_then(|m| m.as_str().parse().ok());
        (min, max)
    }

    fn experience_level(&self, text: &str, title: &str, min_years: Option<u32>) -> ExperienceLevel {
        if let Some(level) = first_level(&self.explicit, text).or_else(|| first_level(&self.explicit, title)) {
            return level;
        }
        if let Some(years) = min_years {
            if let Some((_, level)) = self.bands.iter().find(|(max, _)| max.is_none_or(|max| years <= max)) {
                return *level;
            }
        }
        first_level(&self.fallback, text)
            .or_else(|| first_level(&self.fallback, title))
            .unwrap_or(ExperienceLevel::Unspecified)
    }

    fn education_level(&self, text: &str) -> EducationLevel {
        first_level(&self.education, text).unwrap_or(EducationLevel::Unspecified)
    }

    fn domain_category(&self, title: &str, tags: &BTreeSet<String>) -> DomainCategory {
        let title = fold(title);
        let matches = |text: &str| {
            self.domain
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| contains_term(text, k)))
                .map(|(category, _)| *category)
        };

        matches(&title)
            .or_else(|| tags.iter().find_map(|tag| matches(tag.as_str())))
            .unwrap_or(DomainCategory::Unspecified)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(&NormalizationRules::builtin().unwrap()).unwrap()
    }

    fn posting(title: &str, experience: &str, education: &str, location: &str) -> JobPosting {
        let now = Utc::now();
        JobPosting {
            fingerprint: JobPosting::fingerprint_of("https://x/1", title, ""),
            title: title.into(),
            company_raw: String::new(),
            location_raw: location.into(),
            description_text: String::new(),
            tags_raw: vec![],
            experience_text: experience.into(),
            education_text: education.into(),
            posted_at: None,
            fetched_at: now,
            last_seen_at: now,
            source_url: "https://x/1".into(),
        }
    }

    #[test]
    fn location_precedence() {
        let n = normalizer();
        assert_eq!(n.canonical_location("Nairobi, Kenya"), Canonical::new("Nairobi", MatchKind::Exact));
        assert_eq!(n.canonical_location("NBI"), Canonical::new("Nairobi", MatchKind::Alias));
        assert_eq!(
            n.canonical_location("Westlands Office, Kenya"),
            Canonical::new("Nairobi", MatchKind::Alias)
        );
        assert_eq!(n.canonical_location("Nairobii"), Canonical::new("Nairobi", MatchKind::Fuzzy));
        assert_eq!(n.canonical_location("Kampala, Uganda"), Canonical::unmatched("Kampala, Uganda"));
        assert_eq!(n.canonical_location("   "), Canonical::unmatched(UNKNOWN));
    }

    #[test]
    fn company_aliases_and_fuzzy_matches() {
        let n = normalizer();
        assert_eq!(n.canonical_company("Safaricom"), Canonical::new("Safaricom PLC", MatchKind::Alias));
        assert_eq!(n.canonical_company("safaricom plc"), Canonical::new("Safaricom PLC", MatchKind::Exact));
        assert_eq!(n.canonical_company("Safaricon PLC"), Canonical::new("Safaricom PLC", MatchKind::Fuzzy));
        assert!(n.canonical_company("Acme Widgets Ltd").is_unmatched());
    }

    #[test]
    fn experience_precedence() {
        let n = normalizer();
        let level = |title: &str, text: &str| n.normalize(&posting(title, text, "", "")).experience_level;

        assert_eq!(level("Data Analyst", "0-2 years of experience"), ExperienceLevel::Entry);
        assert_eq!(level("Data Analyst", "3+ years of experience"), ExperienceLevel::Mid);
        assert_eq!(level("Data Analyst", "7 years experience"), ExperienceLevel::Senior);
        assert_eq!(level("Data Science Intern", "1 year experience"), ExperienceLevel::Internship);
        assert_eq!(level("Senior Data Engineer", ""), ExperienceLevel::Senior);
        assert_eq!(level("Data Analyst", "entry level role"), ExperienceLevel::Entry);
        assert_eq!(level("Data Analyst", ""), ExperienceLevel::Unspecified);
    }

    #[test]
    fn years_are_parsed() {
        let n = normalizer();
        let job = n.normalize(&posting("Analyst", "2 - 4 years of experience", "", ""));
        assert_eq!(job.experience_years_min, Some(2));
        assert_eq!(job.experience_years_max, Some(4));
        assert_eq!(job.experience_level, ExperienceLevel::Entry);
    }

    #[test]
    fn education_precedence() {
        let n = normalizer();
        let level = |text: &str| n.normalize(&posting("Analyst", "", text, "")).education_required;

        assert_eq!(level("A Bachelor's degree in Statistics"), EducationLevel::Bachelor);
        assert_eq!(level("Diploma or degree in IT"), EducationLevel::Diploma);
        assert_eq!(level("Diploma in Business IT"), EducationLevel::Diploma);
        assert_eq!(level("No degree required"), EducationLevel::None);
        assert_eq!(level("KCSE mean grade C+"), EducationLevel::None);
        assert_eq!(level(""), EducationLevel::Unspecified);
    }

    #[test]
    fn domain_uses_closed_set() {
        let n = normalizer();
        let domain = |title: &str, tags: &[&str]| {
            let mut p = posting(title, "", "", "");
            p.tags_raw = tags.iter().map(|t| t.to_string()).collect();
            n.normalize(&p).domain_category
        };

        assert_eq!(domain("Data Analyst Intern", &[]), DomainCategory::DataScience);
        assert_eq!(domain("Frontend Developer", &[]), DomainCategory::WebDev);
        assert_eq!(domain("SOC Analyst", &[]), DomainCategory::CyberSecurity);
        assert_eq!(domain("Graduate Trainee", &["ICT Jobs"]), DomainCategory::NetworkSystems);
        assert_eq!(domain("Accounts Assistant", &["Finance"]), DomainCategory::Unspecified);
    }

    #[test]
    fn title_supplies_company_and_clean_title() {
        let n = normalizer();
        let job = n.normalize(&posting("Safaricom Hiring Data Intern", "", "", ""));
        assert_eq!(job.company, Canonical::new("Safaricom PLC", MatchKind::Alias));
        assert_eq!(job.job_title_clean, "Data Intern");
        assert_eq!(job.location, Canonical::unmatched(UNKNOWN));
    }

    #[test]
    fn tags_are_folded_and_aliased() {
        let n = normalizer();
        let mut p = posting("Analyst", "", "", "");
        p.tags_raw = vec!["Internships".into(), "ICT Jobs".into(), "internship".into()];
        let tags: Vec<_> = n.normalize(&p).tags_canonical.into_iter().collect();
        assert_eq!(tags, vec!["internship", "it"]);
    }

    #[test]
    fn normalize_is_deterministic() {
        let n = normalizer();
        let p = posting("Safaricom Hiring Data Intern", "0-2 years", "Degree", "Nairobi");
        assert_eq!(n.normalize(&p), n.normalize(&p));
    }

    #[test]
    fn bad_pattern_is_a_rule_error() {
        let mut rules = NormalizationRules::builtin().unwrap();
        rules.experience.years_pattern = "(unclosed".into();
        assert!(matches!(Normalizer::new(&rules), Err(AppError::Rule { .. })));
    }
}
