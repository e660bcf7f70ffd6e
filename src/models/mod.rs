// src/models/mod.rs

//! Domain models for the profile crawler.
//!
//! Requests and pages flow in, raw field sets are the parser's output and
//! company records or failures come out.

mod config;
mod fields;
mod outcome;
mod record;
mod request;

// Re-export all public types
pub use config::{
    CircuitBreakerConfig, Config, CrawlerConfig, LoggingConfig, NormalizeConfig, OutputConfig,
    OutputFormat,
};
pub use fields::{FieldName, RawFieldSet};
pub use outcome::{
    ExtractionResult, Failure, FailureKind, FailureReport, FetchFailure, FetchFailureReason,
    NormalizeFailure, ParseFailure, ParseFailureReason, Stage,
};
pub use record::{
    CSV_FIELD_SEPARATOR, CSV_ITEM_SEPARATOR, CompanyRecord, NewsItem, Person, ScoopItem,
    SubRecord, TechStackItem,
};
pub use request::{ProfileRequest, RawPage};
