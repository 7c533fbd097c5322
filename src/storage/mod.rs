//! Persistence for raw postings, run reports and tabular outputs.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml               # Optional configuration
//! ├── rules.toml                # Optional normalization table override
//! ├── taxonomy.toml             # Optional skill taxonomy override
//! ├── records/<fingerprint>.json  # One raw posting per file
//! ├── runs.json                 # One report per crawl run
//! ├── raw/jobs.csv              # Raw export
//! └── processed/
//!     ├── jobs_cleaned.csv      # Normalized jobs with skills
//!     └── aggregate_stats.csv   # Skill statistics, long format
//! ```

pub mod local;
pub mod tabular;

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::{JobPosting, RunReport};

pub use local::LocalStore;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New fingerprint; the record was stored
    Inserted,
    /// Known fingerprint; only `last_seen_at` moved
    Touched,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Durable store of raw postings, keyed by fingerprint.
///
/// Writes are serialized; each upsert is either fully persisted or not
/// applied at all.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new posting, or bump `last_seen_at` of a known one. Content
    /// fields of a stored posting never change.
    async fn upsert(&self, posting: JobPosting) -> Result<UpsertOutcome>;

    async fn get(&self, fingerprint: &str) -> Result<Option<JobPosting>>;

    /// All postings, ordered by fingerprint.
    async fn export_all(&self) -> Result<Vec<JobPosting>>;

    async fn len(&self) -> Result<usize>;

    /// Append a run report.
    async fn record_run(&self, report: &RunReport) -> Result<()>;

    /// Run reports, oldest first.
    async fn load_runs(&self) -> Result<Vec<RunReport>>;
}

/// Write bytes atomically (write to temp, then rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn atomic_write_creates_parents_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed/out.csv");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "second");
        assert!(!dir.path().join("processed/out.csv.tmp").exists());
    }

    #[tokio::test]
    async fn atomic_write_leaves_old_content_until_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records/a.json");

        write_atomic(&path, b"old").await.unwrap();
        tokio::fs::write(dir.path().join("records/a.json.tmp"), b"half")
            .await
            .unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "old");

        write_atomic(&path, b"new").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "new");
        assert!(!dir.path().join("records/a.json.tmp").exists());
    }
}
