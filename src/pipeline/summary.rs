// src/pipeline/summary.rs

//! Run summary and process exit codes.

use std::collections::BTreeMap;

use crate::models::{ExtractionResult, Stage};

/// Every request completed.
pub const EXIT_OK: u8 = 0;
/// Config, I/O or network-wide failure.
pub const EXIT_FATAL: u8 = 1;
/// Some requests failed.
pub const EXIT_PARTIAL: u8 = 2;
/// No request completed.
pub const EXIT_TOTAL_FAILURE: u8 = 3;
/// Interrupted by the user, nothing else failed.
pub const EXIT_CANCELLED: u8 = 130;

/// Counts of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub fetch_failed: usize,
    pub parse_failed: usize,
    pub normalize_failed: usize,
    pub cancelled: usize,
    /// Failure count per `stage/reason`
    pub by_reason: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn from_results(results: &[ExtractionResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..RunSummary::default()
        };

        for result in results {
            match result {
                ExtractionResult::Completed(_) => summary.completed += 1,
                ExtractionResult::Cancelled { .. } => summary.cancelled += 1,
                ExtractionResult::Failed(failure) => {
                    match failure.stage() {
                        Stage::Fetch => summary.fetch_failed += 1,
                        Stage::Parse => summary.parse_failed += 1,
                        Stage::Normalize => summary.normalize_failed += 1,
                    }
                    let key = format!("{}/{}", failure.stage().as_str(), failure.reason());
                    *summary.by_reason.entry(key).or_insert(0) += 1;
                }
            }
        }
        summary
    }

    pub fn failed(&self) -> usize {
        self.fetch_failed + self.parse_failed + self.normalize_failed
    }

    pub fn exit_code(&self) -> u8 {
        if self.total == 0 || self.completed == self.total {
            EXIT_OK
        } else if self.cancelled > 0 && self.failed() == 0 {
            EXIT_CANCELLED
        } else if self.completed == 0 {
            EXIT_TOTAL_FAILURE
        } else {
            EXIT_PARTIAL
        }
    }

    pub fn log(&self) {
        log::info!(
            "Run finished: {}/{} completed, {} fetch failed, {} parse failed, {} normalize failed, {} cancelled",
            self.completed,
            self.total,
            self.fetch_failed,
            self.parse_failed,
            self.normalize_failed,
            self.cancelled
        );
        for (reason, count) in &self.by_reason {
            log::info!("  {reason}: {count}");
        }
    }
}
