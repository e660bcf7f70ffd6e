// src/services/mod.rs

//! Service layer for the profile crawler.
//!
//! This module contains the per-request stages:
//! - Page fetching with pacing and retries (`HttpFetcher`)
//! - Field extraction (`ProfileParser`)
//! - Type coercion into records (`Normalizer`)

mod fetcher;
pub mod normalizer;
mod pacing;
mod parser;

pub use fetcher::{HttpFetcher, PageFetcher};
pub use normalizer::Normalizer;
pub use pacing::HostPacer;
pub use parser::{ProfileParser, dedup_values};
