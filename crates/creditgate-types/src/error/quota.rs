//! Admission errors returned to callers before any generation happens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::UsageSnapshot;

/// Terminal per-request denials. None of these are retried by the server.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum QuotaError {
    /// Too many requests from this IP in the current window
    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the window resets
        retry_after_secs: u64,
    },

    /// Monthly quota exhausted for this identity and service
    #[error("Monthly limit reached ({} used)", .usage.used)]
    MonthlyLimitReached {
        /// Usage numbers at the time of the denial
        usage: UsageSnapshot,
    },

    /// The requested service has no generation pipeline
    #[error("Unknown service: {service_id}")]
    UnknownService {
        /// Service id taken from the request path
        service_id: String,
    },

    /// Request body failed validation
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request
        message: String,
    },
}

impl QuotaError {
    /// Stable machine-readable code for API responses.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::MonthlyLimitReached { .. } => "MONTHLY_LIMIT_REACHED",
            Self::UnknownService { .. } => "UNKNOWN_SERVICE",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
        }
    }

    /// Whether waiting (without any account change) may lift the denial.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthlyLimit;

    #[test]
    fn test_codes() {
        let denied = QuotaError::MonthlyLimitReached {
            usage: UsageSnapshot::new(MonthlyLimit::Limited(5), 4),
        };
        assert_eq!(denied.code(), "MONTHLY_LIMIT_REACHED");
        assert!(!denied.is_transient());
        assert_eq!(QuotaError::RateLimited { retry_after_secs: 3 }.code(), "RATE_LIMITED");
        assert!(QuotaError::RateLimited { retry_after_secs: 3 }.is_transient());
    }
}
