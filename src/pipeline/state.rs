// src/pipeline/state.rs

//! Per-request lifecycle.

use std::fmt;

/// Where a single request is in the pipeline.
///
/// ```text
/// Pending -> Fetching -> FetchFailed
///                     -> Fetched -> Parsing -> ParseFailed
///                                           -> Parsed -> Normalizing -> NormalizeFailed
///                                                                    -> Completed
/// ```
///
/// Any non-terminal state may also move to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Fetching,
    Fetched,
    FetchFailed,
    Parsing,
    Parsed,
    ParseFailed,
    Normalizing,
    NormalizeFailed,
    Completed,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::FetchFailed
                | RequestState::ParseFailed
                | RequestState::NormalizeFailed
                | RequestState::Completed
                | RequestState::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;

        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Fetched | FetchFailed)
                | (Fetched, Parsing)
                | (Parsing, Parsed | ParseFailed)
                | (Parsed, Normalizing)
                | (Normalizing, NormalizeFailed | Completed)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one request's state and rejects backward moves.
#[derive(Debug)]
pub struct RequestTracker<'a> {
    url: &'a str,
    state: RequestState,
}

impl<'a> RequestTracker<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            state: RequestState::Pending,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Move to `next`. Illegal moves are bugs and leave the state unchanged.
    pub fn advance(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(next) {
            log::error!(
                "{}: illegal state transition {} -> {}",
                self.url,
                self.state,
                next
            );
            return false;
        }
        log::trace!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
        true
    }
}
