// src/pipeline/validate.rs

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, NormalizationRules, SkillTaxonomy};
use crate::services::Normalizer;
use crate::utils::log::{header, sub_item};

/// Validate configuration, rule tables and the skill taxonomy.
pub fn run_validate(config: &Config, storage_dir: &Path) -> Result<()> {
    header("Validating configuration");

    let outcome = check(config, storage_dir);
    if let Err(e) = &outcome {
        log::error!("Validation failed: {}", e);
    }
    outcome
}

fn check(config: &Config, storage_dir: &Path) -> Result<()> {
    config.validate()?;
    log::info!("✓ Config OK");
    sub_item(&format!("User agent: {}", config.crawler.user_agent));
    sub_item(&format!("Target: {} ({:?})", config.site.base_url, config.site.render));
    sub_item(&format!(
        "Retries: {}, abort after {} consecutive failures",
        config.crawler.max_retries, config.crawler.max_consecutive_failures
    ));

    let paths = &config.paths;
    let rules = NormalizationRules::load_or_builtin(paths.resolve(storage_dir, &paths.rules))?;
    let normalizer = Normalizer::new(&rules)?;
    log::info!("✓ Normalization rules OK");
    sub_item(&format!("Version: {}", normalizer.version()));
    sub_item(&format!(
        "Companies: {}, locations: {}, domain rules: {}",
        rules.company.canonical.len(),
        rules.location.canonical.len(),
        rules.domain.len()
    ));

    let taxonomy = SkillTaxonomy::load_or_builtin(paths.resolve(storage_dir, &paths.taxonomy))?;
    if taxonomy.is_empty() {
        return Err(AppError::rule("taxonomy", "no skills defined"));
    }
    log::info!("✓ Skill taxonomy OK");
    sub_item(&format!("Version: {}", taxonomy.version()));
    sub_item(&format!(
        "Skills: {}, surface forms: {}",
        taxonomy.len(),
        taxonomy.surface_forms().len()
    ));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_tables_validate() {
        let dir = TempDir::new().unwrap();
        assert!(run_validate(&Config::default(), dir.path()).is_ok());
    }

    #[test]
    fn broken_taxonomy_override_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("taxonomy.toml"),
            "version = \"x\"\n[skills.languages]\n\"Python\" = [\"py\"]\n[skills.mlops]\n\"Pytorch\" = [\"py\"]\n",
        )
        .unwrap();

        assert!(matches!(
            run_validate(&Config::default(), dir.path()),
            Err(AppError::Rule { .. })
        ));
    }
}
