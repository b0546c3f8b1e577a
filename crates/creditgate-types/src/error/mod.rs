//! Typed error definitions for creditgate.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains (admission, generation, guest token, config). All errors are designed to be:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants

mod config;
mod generation;
mod quota;
mod token;

pub use config::ConfigError;
pub use generation::GenerationError;
pub use quota::QuotaError;
pub use token::TokenError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps an admission denial
    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    /// Wraps a generation pipeline error
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Wraps a guest usage token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TypedError {
    /// Check if this error is transient and the caller may retry later.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Quota(e) => e.is_transient(),
            Self::Generation(e) => e.is_transient(),
            Self::Token(_) | Self::Config(_) => false,
        }
    }
}

/// Result type alias using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;
