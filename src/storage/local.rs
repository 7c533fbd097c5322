//! Local filesystem record store.
//!
//! Each posting lives in its own `records/<fingerprint>.json`, loaded into
//! memory on open and guarded by a single async lock. An upsert rewrites
//! only the file of the posting it changes. Files are replaced atomically,
//! so an interrupted write leaves the previous version intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{JobPosting, RunReport};
use crate::storage::{RecordStore, UpsertOutcome, write_atomic};

const RECORDS_DIR: &str = "records";
const RUNS: &str = "runs.json";

/// Local filesystem storage backend.
pub struct LocalStore {
    root_dir: PathBuf,
    records: Mutex<BTreeMap<String, JobPosting>>,
    runs: Mutex<()>,
}

impl LocalStore {
    /// Open the store rooted at `root_dir`, loading existing records.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let records = load_records(&root_dir.join(RECORDS_DIR)).await?;
        log::debug!("Opened store at {} with {} records", root_dir.display(), records.len());

        Ok(Self {
            root_dir,
            records: Mutex::new(records),
            runs: Mutex::new(()),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn record_path(&self, fingerprint: &str) -> PathBuf {
        self.root_dir.join(RECORDS_DIR).join(format!("{fingerprint}.json"))
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn upsert(&self, posting: JobPosting) -> Result<UpsertOutcome> {
        if !is_valid_fingerprint(&posting.fingerprint) {
            return Err(AppError::validation(format!(
                "invalid fingerprint '{}' for {}",
                posting.fingerprint, posting.source_url
            )));
        }

        let mut records = self.records.lock().await;
        let fingerprint = posting.fingerprint.clone();

        let (outcome, updated) = match records.get(&fingerprint) {
            Some(existing) => {
                let mut touched = existing.clone();
                touched.last_seen_at = touched.last_seen_at.max(posting.last_seen_at);
                (UpsertOutcome::Touched, touched)
            }
            None => (UpsertOutcome::Inserted, posting),
        };

        // Memory changes only once the file is in place.
        write_json(&self.record_path(&fingerprint), &updated).await?;
        records.insert(fingerprint, updated);

        Ok(outcome)
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<JobPosting>> {
        Ok(self.records.lock().await.get(fingerprint).cloned())
    }

    async fn export_all(&self) -> Result<Vec<JobPosting>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }

    async fn record_run(&self, report: &RunReport) -> Result<()> {
        let _guard = self.runs.lock().await;
        let path = self.path(RUNS);
        let mut runs: Vec<RunReport> = read_json(&path).await?.unwrap_or_default();
        runs.push(report.clone());
        write_json(&path, &runs).await
    }

    async fn load_runs(&self) -> Result<Vec<RunReport>> {
        Ok(read_json(&self.path(RUNS)).await?.unwrap_or_default())
    }
}

/// Fingerprints are lowercase hex digests and double as file names.
fn is_valid_fingerprint(fingerprint: &str) -> bool {
    !fingerprint.is_empty() && fingerprint.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Load every `<fingerprint>.json` under `dir`; a missing directory is empty.
async fn load_records(dir: &Path) -> Result<BTreeMap<String, JobPosting>> {
    let mut records = BTreeMap::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
        Err(e) => return Err(AppError::Io(e)),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            // leftover `.tmp` from an interrupted write
            continue;
        }
        let Some(posting) = read_json::<JobPosting>(&path).await? else {
            continue;
        };
        let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
        if posting.fingerprint != stem {
            return Err(AppError::validation(format!(
                "{} holds fingerprint '{}'",
                path.display(),
                posting.fingerprint
            )));
        }
        records.insert(posting.fingerprint.clone(), posting);
    }

    Ok(records)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes).await
}

/// Read JSON, returning None if the file doesn't exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}
