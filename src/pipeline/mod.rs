//! Pipeline entry points.
//!
//! - `run_crawler`: Fetch postings from the target site into the store
//! - `run_export`: Flatten the store into the raw CSV
//! - `run_process`: Normalize, extract skills and aggregate
//! - `run_pipeline`: All three in order

pub mod circuit_breaker;
pub mod crawl;
pub mod export;
pub mod info;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod process;
pub mod validate;

pub use circuit_breaker::CircuitBreaker;
pub use crawl::{CrawlController, run_crawler, run_crawler_with_source};
pub use export::run_export;
pub use info::{StoreInfo, run_info};
pub use pipeline::{PipelineOutcome, run_pipeline};
pub use process::{ProcessSummary, process_postings, run_process};
pub use validate::run_validate;
