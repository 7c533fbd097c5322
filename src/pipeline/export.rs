// src/pipeline/export.rs

//! Raw export stage: the record store flattened into one CSV.

use std::path::Path;

use crate::error::Result;
use crate::storage::RecordStore;
use crate::storage::tabular;

/// Write every stored posting to `path`; returns the row count.
pub async fn run_export(store: &dyn RecordStore, path: &Path) -> Result<usize> {
    let postings = store.export_all().await?;
    tabular::write_raw(path, &postings).await?;
    log::info!("Exported {} posting(s) to {}", postings.len(), path.display());
    Ok(postings.len())
}
