//! Ordered model fallback.
//!
//! The orchestrator hands an ordered candidate list and a payload to
//! [`FallbackExecutor::execute`]. Each candidate gets at most one transient
//! retry and at most one downgrade from enhanced to plain mode; the two
//! budgets are independent. Anything else moves on to the next candidate.

mod executor;
mod http;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{ExecutionSuccess, FallbackExecutor, GenerationAttempt, NextStep};
pub use http::{classify_status, HttpModelInvoker};

use async_trait::async_trait;
use creditgate_types::{GeneratedOutput, GenerationPayload, InvokeMode, ModelErrorKind};

/// Classified failure of one model call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct InvokeError {
    pub kind: ModelErrorKind,
    pub message: String,
}

impl InvokeError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Transient, message)
    }

    pub fn unsupported_mode(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::UnsupportedMode, message)
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Empty, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Fatal, message)
    }
}

/// One call to a generative model. Implementations classify their own
/// failures; the executor never inspects transport details.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        model_id: &str,
        payload: &GenerationPayload,
        mode: InvokeMode,
    ) -> Result<Vec<GeneratedOutput>, InvokeError>;
}
