// src/lib.rs

//! Job market crawler and skill-demand ETL.
//!
//! Crawls one job board politely into a local record store, then derives
//! normalized jobs, per-job skills and aggregate skill statistics as CSV.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
