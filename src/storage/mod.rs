// src/storage/mod.rs

//! Storage abstractions for extraction output.
//!
//! A run produces two files:
//!
//! ```text
//! {output}/
//! ├── {prefix}.json | {prefix}.csv   # Completed records, input order
//! └── {prefix}_errors.json           # Failed and cancelled URLs
//! ```

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ExtractionResult, FailureReport};

// Re-export for convenience
pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the completed records went
    pub records_path: PathBuf,
    /// Where the error report went
    pub errors_path: PathBuf,
    pub record_count: usize,
    pub failure_count: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Contents of the error report file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// ISO 8601 timestamp of the run
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    /// One entry per failed or cancelled URL, input order
    pub failures: Vec<FailureReport>,
}

impl ErrorReport {
    pub fn from_results(results: &[ExtractionResult]) -> Self {
        let failures: Vec<FailureReport> =
            results.iter().filter_map(|r| r.report_entry()).collect();
        Self {
            generated_at: Utc::now(),
            count: failures.len(),
            failures,
        }
    }
}

/// Trait for output backends.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Write completed records and the error report for one run.
    async fn write_results(&self, results: &[ExtractionResult]) -> Result<WriteMetadata>;

    /// Load the error report of the last run.
    async fn load_errors(&self) -> Result<Option<ErrorReport>>;
}
