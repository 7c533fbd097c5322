// src/pipeline/pipeline.rs

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlParams, RunReport};
use crate::storage::RecordStore;
use crate::utils::log::{header, step};

use super::crawl::run_crawler;
use super::export::run_export;
use super::process::{ProcessSummary, run_process};

/// What a full pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: RunReport,
    pub exported: usize,
    pub processed: ProcessSummary,
}

/// Run the full pipeline: Crawl → Export → Process.
///
/// An aborted crawl still exports and processes the records committed so
/// far; the abort error is returned afterwards.
pub async fn run_pipeline(
    config: &Config,
    storage_dir: &Path,
    store: &dyn RecordStore,
    params: &CrawlParams,
    cancel: Arc<AtomicBool>,
) -> Result<PipelineOutcome> {
    header("Job market pipeline");

    step(1, 3, "Crawl - Fetching postings");
    let crawled = match run_crawler(config, store, params, cancel).await {
        Ok(report) => Ok(report),
        Err(e @ AppError::CrawlAborted { .. }) => {
            log::warn!("Crawl aborted; processing the records stored so far");
            Err(e)
        }
        Err(e) => return Err(e),
    };

    step(2, 3, "Export - Writing raw postings");
    let raw_path = config.paths.resolve(storage_dir, &config.paths.raw_export);
    let exported = run_export(store, &raw_path).await?;

    step(3, 3, "Process - Normalizing and extracting skills");
    let processed = run_process(config, storage_dir).await?;

    let report = crawled?;
    log::info!("Pipeline complete!");

    Ok(PipelineOutcome {
        report,
        exported,
        processed,
    })
}
