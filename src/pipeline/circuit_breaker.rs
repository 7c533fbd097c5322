//! Circuit Breaker pattern implementation.
//!
//! Stops a crawl once the target keeps failing, so a broken or throttling
//! site is not hammered for the rest of the run. Any success closes the
//! breaker again; only an unbroken run of failures trips it.

use crate::error::{AppError, Result};

/// Result of circuit breaker check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerResult {
    /// Below the threshold; keep crawling
    Closed { consecutive_failures: u32 },
    /// Threshold reached; abort the run
    Tripped { consecutive_failures: u32 },
}

/// Counts consecutive fetch failures within one run.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive: u32,
}

impl CircuitBreaker {
    /// Trip after `threshold` consecutive failures. A threshold of 0 is
    /// treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    /// A fetch succeeded; the failure streak ends.
    pub fn record_success(&mut self) {
        if self.consecutive > 0 {
            log::debug!(
                "Circuit breaker: reset after {} consecutive failure(s)",
                self.consecutive
            );
        }
        self.consecutive = 0;
    }

    /// Count a failure and report the breaker state.
    pub fn check_failure(&mut self) -> CircuitBreakerResult {
        self.consecutive += 1;
        if self.consecutive >= self.threshold {
            CircuitBreakerResult::Tripped {
                consecutive_failures: self.consecutive,
            }
        } else {
            CircuitBreakerResult::Closed {
                consecutive_failures: self.consecutive,
            }
        }
    }

    /// Count a failure; Err once the threshold is reached.
    pub fn record_failure(&mut self) -> Result<()> {
        match self.check_failure() {
            CircuitBreakerResult::Closed {
                consecutive_failures,
            } => {
                log::warn!(
                    "Circuit breaker: {}/{} consecutive failures",
                    consecutive_failures,
                    self.threshold
                );
                Ok(())
            }
            CircuitBreakerResult::Tripped {
                consecutive_failures,
            } => {
                log::error!(
                    "Circuit breaker: TRIPPED after {} consecutive failures (threshold {})",
                    consecutive_failures,
                    self.threshold
                );
                Err(AppError::CrawlAborted {
                    consecutive_failures,
                    threshold: self.threshold,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_below_threshold() {
        let mut cb = CircuitBreaker::new(3);
        assert!(cb.record_failure().is_ok());
        assert!(cb.record_failure().is_ok());
        assert_eq!(cb.consecutive_failures(), 2);
    }

    #[test]
    fn test_trips_at_threshold() {
        let mut cb = CircuitBreaker::new(3);
        cb.record_failure().unwrap();
        cb.record_failure().unwrap();

        let err = cb.record_failure().unwrap_err();
        assert!(matches!(
            err,
            AppError::CrawlAborted {
                consecutive_failures: 3,
                threshold: 3
            }
        ));
    }

    #[test]
    fn test_success_resets_streak() {
        let mut cb = CircuitBreaker::new(3);
        cb.record_failure().unwrap();
        cb.record_failure().unwrap();
        cb.record_success();

        assert_eq!(cb.consecutive_failures(), 0);
        assert!(matches!(
            cb.check_failure(),
            CircuitBreakerResult::Closed {
                consecutive_failures: 1
            }
        ));
    }

    #[test]
    fn test_zero_threshold_trips_on_first_failure() {
        let mut cb = CircuitBreaker::new(0);
        assert_eq!(cb.threshold(), 1);
        assert!(cb.record_failure().is_err());
    }
}
