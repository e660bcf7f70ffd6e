// src/pipeline/mod.rs

//! Pipeline entry points for profile extraction.
//!
//! - `ProfilePipeline::run`: fetch, parse and normalize a list of profiles
//! - `extract_page`: parse and normalize a page that is already on disk

pub mod circuit_breaker;
pub mod orchestrator;
pub mod state;
pub mod summary;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
pub use orchestrator::{ProfilePipeline, extract_page};
pub use state::{RequestState, RequestTracker};
pub use summary::{
    EXIT_CANCELLED, EXIT_FATAL, EXIT_OK, EXIT_PARTIAL, EXIT_TOTAL_FAILURE, RunSummary,
};
