// src/pipeline/info.rs

//! Store overview for the `info` command.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::RunReport;
use crate::storage::RecordStore;
use crate::utils::log::{header, sub_item};
use crate::utils::text::fold;

/// What the store currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreInfo {
    pub total_records: usize,
    /// Records tagged with the internship category
    pub internship_records: usize,
    pub first_fetched_at: Option<DateTime<Utc>>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_run: Option<RunReport>,
}

impl StoreInfo {
    pub async fn collect(store: &dyn RecordStore) -> Result<Self> {
        let postings = store.export_all().await?;
        let runs = store.load_runs().await?;

        Ok(Self {
            total_records: postings.len(),
            internship_records: postings
                .iter()
                .filter(|p| p.tags_raw.iter().any(|tag| fold(tag).starts_with("internship")))
                .count(),
            first_fetched_at: postings.iter().map(|p| p.fetched_at).min(),
            last_fetched_at: postings.iter().map(|p| p.fetched_at).max(),
            last_run: runs.into_iter().last(),
        })
    }
}

/// Log the store overview.
pub async fn run_info(store: &dyn RecordStore) -> Result<StoreInfo> {
    let info = StoreInfo::collect(store).await?;

    header("Store info");
    sub_item(&format!("Records: {}", info.total_records));
    sub_item(&format!("Internship records: {}", info.internship_records));
    match (info.first_fetched_at, info.last_fetched_at) {
        (Some(first), Some(last)) => {
            sub_item(&format!("First fetch: {}", first.to_rfc3339()));
            sub_item(&format!("Last fetch: {}", last.to_rfc3339()));
        }
        _ => sub_item("No records fetched yet."),
    }
    match &info.last_run {
        Some(run) => sub_item(&format!("Last run ({}): {}", run.finished_at.to_rfc3339(), run.summary())),
        None => sub_item("No crawl runs recorded."),
    }

    Ok(info)
}
