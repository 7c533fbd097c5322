// src/models/mod.rs

//! Domain models for the job market pipeline.
//!
//! Raw postings, their normalized form, the rule and taxonomy tables that
//! drive normalization, and the statistics and run reports derived from them.

mod cleaned;
mod config;
mod posting;
mod rules;
mod run;
mod stats;
mod taxonomy;

pub use cleaned::{Canonical, CleanedJob, DomainCategory, EducationLevel, ExperienceLevel, MatchKind};
pub use config::{
    Config, CrawlerConfig, PathsConfig, PolitenessConfig, RenderMode, SiteConfig, SiteSelectors,
};
pub use posting::{JobDetail, JobPosting, ListingRow, company_from_title, split_title};
pub use rules::{
    DomainRule, ExperienceRules, LevelRule, NormalizationRules, TagTable, VocabularyTable, YearBand,
};
pub use run::{CrawlMode, CrawlParams, RunReport, StopReason};
pub use stats::{AggregateStats, SkillExtraction, SkillPair};
pub(crate) use stats::percent;
pub use taxonomy::{SOFT_SKILLS, Skill, SkillTaxonomy};
