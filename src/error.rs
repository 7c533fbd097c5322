// src/error.rs

//! Unified error handling for the job market pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Ambiguous normalization and taxonomy misses are not errors:
/// they degrade to explicit "unknown" values instead of failing a record.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// A rule table entry could not be compiled
    #[error("Invalid {table} rule: {message}")]
    Rule { table: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient transport failure outside of reqwest (e.g. a browser session)
    #[error("Transport error: {0}")]
    Transport(String),

    /// robots.txt disallows the path; the request was never sent
    #[error("Blocked by robots policy: {url}")]
    PolicyBlocked { url: String },

    /// Retrieval failed after the retry budget was spent
    #[error("Fetch failed for {url} after {attempts} attempt(s): {message}")]
    FetchFailed {
        url: String,
        attempts: u32,
        message: String,
    },

    /// Too many consecutive fetch failures; the run was stopped
    #[error("Crawl aborted after {consecutive_failures} consecutive failures (threshold {threshold})")]
    CrawlAborted {
        consecutive_failures: u32,
        threshold: u32,
    },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a rule table error.
    pub fn rule(table: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Rule {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch failure.
    pub fn fetch_failed(url: impl Into<String>, attempts: u32, message: impl fmt::Display) -> Self {
        Self::FetchFailed {
            url: url.into(),
            attempts,
            message: message.to_string(),
        }
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(AppError::Transport("tab crashed".into()).is_transient());
    }

    #[test]
    fn policy_and_config_errors_are_not_transient() {
        let blocked = AppError::PolicyBlocked {
            url: "https://example.com/wp-admin".into(),
        };
        assert!(!blocked.is_transient());
        assert!(!AppError::config("missing").is_transient());
    }

    #[test]
    fn crawl_aborted_message_names_threshold() {
        let err = AppError::CrawlAborted {
            consecutive_failures: 3,
            threshold: 3,
        };
        assert!(err.to_string().contains("threshold 3"));
    }
}
