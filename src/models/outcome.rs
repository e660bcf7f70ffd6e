// src/models/outcome.rs

//! Per-request failures and extraction results.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fields::FieldName;
use super::record::CompanyRecord;

/// Why a page could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureReason {
    Timeout,
    Blocked,
    NotFound,
    NetworkError,
}

impl FetchFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailureReason::Timeout => "timeout",
            FetchFailureReason::Blocked => "blocked",
            FetchFailureReason::NotFound => "not_found",
            FetchFailureReason::NetworkError => "network_error",
        }
    }

    /// Failures that say nothing about the page itself.
    pub fn is_network_level(&self) -> bool {
        matches!(
            self,
            FetchFailureReason::Timeout | FetchFailureReason::NetworkError
        )
    }
}

impl fmt::Display for FetchFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal fetch failure, after retries.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("fetch failed ({reason}) after {attempts} attempt(s): {detail}")]
pub struct FetchFailure {
    pub reason: FetchFailureReason,
    pub attempts: u32,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailureReason {
    /// The page is not a company profile (wrong type, deleted listing)
    NotAProfile,
    /// Profile anchor found but the expected content is not where it should be
    StructureChanged,
}

impl ParseFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseFailureReason::NotAProfile => "not_a_profile",
            ParseFailureReason::StructureChanged => "structure_changed",
        }
    }
}

impl fmt::Display for ParseFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("parse failed ({reason}): {detail}")]
pub struct ParseFailure {
    pub reason: ParseFailureReason,
    pub detail: String,
}

impl ParseFailure {
    pub fn not_a_profile(detail: impl Into<String>) -> Self {
        Self {
            reason: ParseFailureReason::NotAProfile,
            detail: detail.into(),
        }
    }

    pub fn structure_changed(detail: impl Into<String>) -> Self {
        Self {
            reason: ParseFailureReason::StructureChanged,
            detail: detail.into(),
        }
    }
}

/// A field value that no coercion could turn into its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("field '{field}' could not be normalized: {reason}")]
pub struct NormalizeFailure {
    pub field: FieldName,
    pub reason: String,
}

impl NormalizeFailure {
    pub fn new(field: FieldName, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Parse,
    Normalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Normalize => "normalize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Fetch(FetchFailure),
    Parse(ParseFailure),
    Normalize(NormalizeFailure),
}

/// A request that ended in a failed terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub url: String,
    pub kind: FailureKind,
}

impl Failure {
    pub fn stage(&self) -> Stage {
        match self.kind {
            FailureKind::Fetch(_) => Stage::Fetch,
            FailureKind::Parse(_) => Stage::Parse,
            FailureKind::Normalize(_) => Stage::Normalize,
        }
    }

    /// Short machine-readable reason, e.g. `timeout` or `not_a_profile`.
    pub fn reason(&self) -> String {
        match &self.kind {
            FailureKind::Fetch(f) => f.reason.as_str().to_string(),
            FailureKind::Parse(f) => f.reason.as_str().to_string(),
            FailureKind::Normalize(f) => format!("invalid_{}", f.field),
        }
    }

    pub fn detail(&self) -> String {
        match &self.kind {
            FailureKind::Fetch(f) => f.detail.clone(),
            FailureKind::Parse(f) => f.detail.clone(),
            FailureKind::Normalize(f) => f.reason.clone(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Fetch(e) => write!(f, "{}: {}", self.url, e),
            FailureKind::Parse(e) => write!(f, "{}: {}", self.url, e),
            FailureKind::Normalize(e) => write!(f, "{}: {}", self.url, e),
        }
    }
}

/// Final outcome for one requested URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Completed(Box<CompanyRecord>),
    Failed(Failure),
    /// The run was cancelled before this request finished
    Cancelled { url: String },
}

impl ExtractionResult {
    pub fn url(&self) -> &str {
        match self {
            ExtractionResult::Completed(record) => &record.url,
            ExtractionResult::Failed(failure) => &failure.url,
            ExtractionResult::Cancelled { url } => url,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExtractionResult::Completed(_))
    }

    pub fn record(&self) -> Option<&CompanyRecord> {
        match self {
            ExtractionResult::Completed(record) => Some(record),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ExtractionResult::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Error report row; `None` for completed records.
    pub fn report_entry(&self) -> Option<FailureReport> {
        match self {
            ExtractionResult::Completed(_) => None,
            ExtractionResult::Failed(failure) => Some(FailureReport {
                url: failure.url.clone(),
                stage: failure.stage().as_str().to_string(),
                reason: failure.reason(),
                detail: failure.detail(),
                attempts: match &failure.kind {
                    FailureKind::Fetch(f) => Some(f.attempts),
                    _ => None,
                },
            }),
            ExtractionResult::Cancelled { url } => Some(FailureReport {
                url: url.clone(),
                stage: "cancelled".to_string(),
                reason: "cancelled".to_string(),
                detail: "run cancelled before this request completed".to_string(),
                attempts: None,
            }),
        }
    }
}

/// One entry of the error report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub url: String,
    pub stage: String,
    pub reason: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}
