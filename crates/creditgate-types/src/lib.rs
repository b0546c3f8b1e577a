//! # creditgate Types
//!
//! Core types, models, and error definitions for creditgate.
//!
//! This crate provides the foundational type system for the workspace:
//!
//! - **`error`** - Typed error hierarchy for quota, generation, and configuration
//! - **`models`** - Domain models (identity, plans, usage records, model candidates, config)
//! - **`protocol`** - Request/response shapes exchanged with the generative model
//!
//! ## Architecture Role
//!
//! `creditgate-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!              creditgate-types (this crate)
//!                        │
//!                        ▼
//!                 creditgate-core
//!                        │
//!                        ▼
//!                creditgate-server
//! ```
//!
//! Nothing in here performs I/O.

pub mod error;
pub mod models;
pub mod protocol;

// Re-export error types for convenience
pub use error::{ConfigError, GenerationError, QuotaError, Result, TokenError, TypedError};

// Re-export core model types
pub use models::{
    AppConfig, CallerIdentity, GuestUsage, IdentityKind, ModelCandidate, MonthlyLimit,
    MonthlyUsageRecord, OverflowPolicy, PeriodKey, PlanLimits, PlanTable, PlanTier, QuotaTier,
    UsageSnapshot,
};
pub use protocol::{GeneratedOutput, GenerationPayload, InvokeMode, ModelErrorKind};
