//! Skill taxonomy: canonical skills, their categories and alias surface forms.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};

const BUILTIN_TAXONOMY: &str = include_str!("../../data/taxonomy.toml");

/// Category excluded from the hard-skills co-occurrence table.
pub const SOFT_SKILLS: &str = "soft_skills";

/// On-disk layout: `[skills.<category>]` tables of `name = [aliases]`.
#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    version: String,
    skills: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

/// A recognized skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub category: String,
    pub aliases: Vec<String>,
}

/// Process-wide, read-only skill taxonomy.
#[derive(Debug, Clone)]
pub struct SkillTaxonomy {
    version: String,
    skills: BTreeMap<String, Skill>,
    /// Lower-case surface form -> canonical name, longest form first
    surface_forms: Vec<(String, String)>,
}

impl SkillTaxonomy {
    /// Parse and index a taxonomy document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: TaxonomyFile = toml::from_str(content)?;

        let mut skills = BTreeMap::new();
        let mut forms: BTreeMap<String, String> = BTreeMap::new();

        for (category, entries) in file.skills {
            for (name, aliases) in entries {
                if name.trim().is_empty() {
                    return Err(AppError::rule("taxonomy", format!("empty skill name in '{category}'")));
                }
                if skills.contains_key(&name) {
                    return Err(AppError::rule("taxonomy", format!("skill '{name}' is listed twice")));
                }

                for form in std::iter::once(&name).chain(aliases.iter()) {
                    let key = form.trim().to_lowercase();
                    if key.is_empty() {
                        continue;
                    }
                    match forms.get(&key) {
                        Some(owner) if owner != &name => {
                            return Err(AppError::rule(
                                "taxonomy",
                                format!("surface form '{key}' maps to both '{owner}' and '{name}'"),
                            ));
                        }
                        _ => {
                            forms.insert(key, name.clone());
                        }
                    }
                }

                skills.insert(
                    name.clone(),
                    Skill {
                        name,
                        category: category.clone(),
                        aliases,
                    },
                );
            }
        }

        let mut surface_forms: Vec<_> = forms.into_iter().collect();
        surface_forms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self {
            version: file.version,
            skills,
            surface_forms,
        })
    }

    /// The taxonomy compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_TAXONOMY)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Load `path` if it exists, the built-in taxonomy otherwise.
    pub fn load_or_builtin(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Loading skill taxonomy from {}", path.display());
            Self::load(path)
        } else {
            log::debug!("No taxonomy at {}; using built-in taxonomy", path.display());
            Self::builtin()
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    pub fn category(&self, name: &str) -> Option<&str> {
        self.skills.get(name).map(|s| s.category.as_str())
    }

    pub fn is_soft_skill(&self, name: &str) -> bool {
        self.category(name) == Some(SOFT_SKILLS)
    }

    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// `(surface form, canonical name)` pairs, longest surface form first.
    pub fn surface_forms(&self) -> &[(String, String)] {
        &self.surface_forms
    }
}
