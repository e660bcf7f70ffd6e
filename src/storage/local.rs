// src/storage/local.rs

//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── {prefix}.json          # or {prefix}.csv
//! └── {prefix}_errors.json
//! ```
//!
//! Every file is written atomically: temp file first, then rename.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CompanyRecord, ExtractionResult, OutputConfig, OutputFormat};
use crate::storage::{ErrorReport, RecordStorage, WriteMetadata};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    prefix: String,
    format: OutputFormat,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, prefix: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            root_dir: root_dir.into(),
            prefix: prefix.into(),
            format,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, &config.filename_prefix, config.format)
    }

    fn records_key(&self) -> String {
        format!("{}.{}", self.prefix, self.format.extension())
    }

    fn errors_key(&self) -> String {
        format!("{}_errors.json", self.prefix)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Records as CSV with a header row in `CompanyRecord::CSV_COLUMNS` order.
pub fn records_to_csv(records: &[&CompanyRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CompanyRecord::CSV_COLUMNS)?;
    for record in records {
        writer.write_record(record.csv_row())?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

#[async_trait]
impl RecordStorage for LocalStorage {
    async fn write_results(&self, results: &[ExtractionResult]) -> Result<WriteMetadata> {
        let records: Vec<&CompanyRecord> = results.iter().filter_map(|r| r.record()).collect();

        let records_path = match self.format {
            OutputFormat::Json => self.write_json(&self.records_key(), &records).await?,
            OutputFormat::Csv => {
                let bytes = records_to_csv(&records)?;
                self.write_bytes(&self.records_key(), &bytes).await?
            }
        };
        log::info!(
            "Wrote {} record(s) to {}",
            records.len(),
            records_path.display()
        );

        let report = ErrorReport::from_results(results);
        let errors_path = self.write_json(&self.errors_key(), &report).await?;
        if report.count > 0 {
            log::info!(
                "Wrote {} failure(s) to {}",
                report.count,
                errors_path.display()
            );
        }

        Ok(WriteMetadata {
            records_path,
            errors_path,
            record_count: records.len(),
            failure_count: report.count,
            timestamp: Utc::now(),
        })
    }

    async fn load_errors(&self) -> Result<Option<ErrorReport>> {
        self.read_json(&self.errors_key()).await
    }
}
