// src/services/mod.rs

//! Crawl and ETL services.

#[cfg(feature = "browser")]
pub mod browser;
pub mod fetcher;
pub mod normalizer;
pub mod politeness;
pub mod site;
pub mod skills;
pub mod source;

#[cfg(feature = "browser")]
pub use browser::BrowserSource;
pub use fetcher::{FetchStrategy, Fetcher, RetryPolicy};
pub use normalizer::Normalizer;
pub use politeness::PolitenessPolicy;
pub use site::{JobSite, ListingPage, PageRef};
pub use source::{HttpSource, PageSource, RawPage};
