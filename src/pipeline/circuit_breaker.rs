// src/pipeline/circuit_breaker.rs

//! Circuit Breaker pattern implementation.
//!
//! Stops a run early when the network itself is down instead of burning
//! retries on every remaining URL.
//!
//! ## Rule
//!
//! > If the first `failure_threshold` results of a run are **all**
//! > network-level fetch failures (timeout / network error), the run is
//! > aborted. A single result of any other kind closes the window for good.

use crate::error::{AppError, Result};
use crate::models::{CircuitBreakerConfig, ExtractionResult, FailureKind};

/// Watches the opening results of a run for a dead network.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    network_failures: usize,
    cleared: bool,
    last_reason: String,
}

/// Result of circuit breaker check.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerResult {
    /// Threshold is 0
    Disabled,
    /// Still inside the opening window, all network failures so far
    Watching { network_failures: usize },
    /// Something other than a network failure was seen
    Cleared,
    /// Every one of the first `failure_threshold` results was a network failure
    Triggered {
        consecutive: usize,
        last_reason: String,
    },
}

impl CircuitBreaker {
    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            network_failures: 0,
            cleared: false,
            last_reason: String::new(),
        }
    }

    fn network_failure(result: &ExtractionResult) -> Option<String> {
        match result.failure().map(|f| &f.kind) {
            Some(FailureKind::Fetch(fetch)) if fetch.reason.is_network_level() => {
                Some(format!("{} ({})", fetch.reason, fetch.detail))
            }
            _ => None,
        }
    }

    /// Record one finished result.
    pub fn check(&mut self, result: &ExtractionResult) -> CircuitBreakerResult {
        let threshold = self.config.failure_threshold;
        if threshold == 0 {
            return CircuitBreakerResult::Disabled;
        }
        if self.cleared {
            return CircuitBreakerResult::Cleared;
        }

        match Self::network_failure(result) {
            Some(reason) => {
                self.network_failures += 1;
                self.last_reason = reason;
            }
            // Cancellations say nothing about the network
            None if matches!(result, ExtractionResult::Cancelled { .. }) => {}
            None => {
                self.cleared = true;
                return CircuitBreakerResult::Cleared;
            }
        }

        if self.network_failures >= threshold {
            CircuitBreakerResult::Triggered {
                consecutive: self.network_failures,
                last_reason: self.last_reason.clone(),
            }
        } else {
            CircuitBreakerResult::Watching {
                network_failures: self.network_failures,
            }
        }
    }

    /// Record a result and return Err if the breaker tripped.
    pub fn validate(&mut self, result: &ExtractionResult) -> Result<()> {
        match self.check(result) {
            CircuitBreakerResult::Triggered {
                consecutive,
                last_reason,
            } => {
                log::error!(
                    "Circuit breaker: TRIGGERED! first {} results were network failures, last: {}",
                    consecutive,
                    last_reason
                );
                Err(AppError::NetworkUnavailable {
                    consecutive,
                    last_reason,
                })
            }
            CircuitBreakerResult::Watching { network_failures } => {
                log::debug!(
                    "Circuit breaker: {}/{} opening results were network failures",
                    network_failures,
                    self.config.failure_threshold
                );
                Ok(())
            }
            CircuitBreakerResult::Disabled | CircuitBreakerResult::Cleared => Ok(()),
        }
    }
}
