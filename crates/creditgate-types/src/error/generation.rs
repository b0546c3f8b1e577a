//! Generation pipeline errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::ModelErrorKind;

/// Failures surfaced by the generation pipeline after the fallback chain has
/// absorbed everything it can. Transient and unsupported-mode upstream errors
/// never appear here on their own.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum GenerationError {
    /// Every candidate model was tried and none produced output
    #[error("All {attempted} candidate model(s) exhausted, last error: {last_error}")]
    AllCandidatesExhausted {
        /// Number of candidates that were attempted
        attempted: usize,
        /// Classification of the most recent failure
        last_error: ModelErrorKind,
        /// Upstream message attached to the most recent failure
        message: String,
    },

    /// The service has no configured candidates
    #[error("No model candidates configured for service {service_id}")]
    NoCandidates {
        /// Service that was requested
        service_id: String,
    },

    /// The overall request deadline elapsed while generation was in flight
    #[error("Generation timed out after {after_ms}ms")]
    TimedOut {
        /// Deadline that elapsed, in milliseconds
        after_ms: u64,
    },
}

impl GenerationError {
    /// Check if this is a temporary error that may resolve on retry.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::AllCandidatesExhausted { last_error, .. } => last_error.is_transient(),
            Self::TimedOut { .. } => true,
            Self::NoCandidates { .. } => false,
        }
    }
}
