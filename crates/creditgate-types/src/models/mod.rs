//! Core domain models for creditgate.
//!
//! This module contains all shared data structures used across the workspace.

mod candidate;
pub mod config;
mod identity;
mod plan;
mod usage;

// Re-export all models
pub use candidate::ModelCandidate;
pub use config::{
    AppConfig, GenerationConfig, GuestTokenConfig, ProviderConfig, QuotaConfig, RateLimitConfig,
    ServerConfig,
};
pub use identity::{CallerIdentity, IdentityKind};
pub use plan::{MonthlyLimit, OverflowPolicy, PlanLimits, PlanTable, PlanTier, QuotaTier};
pub use usage::{GuestUsage, MonthlyUsageRecord, PeriodKey, UsageSnapshot};
