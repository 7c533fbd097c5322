//! Normalization rule tables.
//!
//! Tables are data: a versioned TOML document loaded once per run. The
//! built-in copy lives in `data/rules.toml`; a `rules.toml` in the storage
//! directory replaces it wholesale.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{DomainCategory, EducationLevel, ExperienceLevel};

const BUILTIN_RULES: &str = include_str!("../../data/rules.toml");

/// All reference tables used by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationRules {
    /// Free-form table version, recorded next to processed output
    pub version: String,
    pub company: VocabularyTable,
    pub location: VocabularyTable,
    #[serde(default)]
    pub tags: TagTable,
    pub experience: ExperienceRules,
    #[serde(default)]
    pub education: Vec<LevelRule<EducationLevel>>,
    #[serde(default)]
    pub domain: Vec<DomainRule>,
}

/// A controlled vocabulary with known aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyTable {
    /// Minimum similarity for a fuzzy match against `canonical`
    #[serde(default = "default_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default)]
    pub canonical: Vec<String>,
    /// Lower-case surface form -> canonical member
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_threshold() -> f64 {
    0.9
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagTable {
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Experience rules, evaluated as `explicit`, then `bands` against the
/// years found by `years_pattern`, then `fallback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceRules {
    /// Regex whose first group is the minimum years and optional second
    /// group the maximum
    pub years_pattern: String,
    #[serde(default)]
    pub explicit: Vec<LevelRule<ExperienceLevel>>,
    #[serde(default)]
    pub bands: Vec<YearBand>,
    #[serde(default)]
    pub fallback: Vec<LevelRule<ExperienceLevel>>,
}

/// A level assigned when any of `patterns` matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRule<L> {
    pub level: L,
    pub patterns: Vec<String>,
}

/// Assigns `level` when the minimum years is at most `max_years`.
/// A band without `max_years` catches everything above the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearBand {
    #[serde(default)]
    pub max_years: Option<u32>,
    pub level: ExperienceLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRule {
    pub category: DomainCategory,
    pub keywords: Vec<String>,
}

impl NormalizationRules {
    /// Parse tables from TOML text and validate them.
    pub fn from_toml(content: &str) -> Result<Self> {
        let rules: Self = toml::from_str(content)?;
        rules.validate()?;
        Ok(rules)
    }

    /// The tables compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_RULES)
    }

    /// Load tables from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Load `path` if it exists, the built-in tables otherwise.
    pub fn load_or_builtin(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Loading normalization rules from {}", path.display());
            Self::load(path)
        } else {
            log::debug!("No rules at {}; using built-in tables", path.display());
            Self::builtin()
        }
    }

    /// Check internal consistency: aliases point into the vocabulary,
    /// thresholds are in range and rule lists are usable.
    pub fn validate(&self) -> Result<()> {
        for (name, table) in [("company", &self.company), ("location", &self.location)] {
            if !(0.0..=1.0).contains(&table.fuzzy_threshold) {
                return Err(AppError::rule(name, "fuzzy_threshold must be within [0, 1]"));
            }
            for (alias, target) in &table.aliases {
                if alias != &alias.to_lowercase() {
                    return Err(AppError::rule(name, format!("alias '{alias}' must be lower-case")));
                }
                if !table.canonical.contains(target) {
                    return Err(AppError::rule(
                        name,
                        format!("alias '{alias}' points outside the vocabulary: '{target}'"),
                    ));
                }
            }
        }

        if self.experience.bands.iter().filter(|b| b.max_years.is_none()).count() > 1 {
            return Err(AppError::rule("experience", "only one open-ended band is allowed"));
        }

        if let Some(rule) = self
            .domain
            .iter()
            .find(|r| r.category == DomainCategory::Unspecified)
        {
            return Err(AppError::rule(
                "domain",
                format!("'{}' is the fallback and cannot carry keywords", rule.category),
            ));
        }

        Ok(())
    }
}
