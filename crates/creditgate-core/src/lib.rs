//! # creditgate Core
//!
//! Quota-enforced generation orchestrator.
//!
//! ## Architecture
//!
//! ```text
//! creditgate-core/src/
//! ├── limiter/       # per-IP fixed-window admission
//! ├── quota/         # monthly ledger, period math, promo window, guest token
//! ├── repository/    # usage storage (in-memory, PostgreSQL)
//! ├── fallback/      # ordered model candidates, retry/downgrade/advance walk
//! ├── orchestrator/  # RateLimit → Quota → Execute → Commit pipeline
//! ├── config.rs      # config file + env overrides
//! └── metrics.rs     # Prometheus recorder
//! ```
//!
//! The orchestrator is the only component that calls the others, always in
//! the same order. Quota is committed only after the executor delivered at
//! least one unit, and only for what was delivered.

#![allow(
    clippy::significant_drop_tightening,
    reason = "DashMap entry guards are held for the whole check-and-increment"
)]
#![cfg_attr(test, allow(clippy::panic, clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod fallback;
pub mod limiter;
pub mod metrics;
pub mod orchestrator;
pub mod quota;
pub mod repository;

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use fallback::{FallbackExecutor, HttpModelInvoker, InvokeError, ModelInvoker};
pub use limiter::{Admission, RateLimiter};
pub use orchestrator::{
    GenerationOrchestrator, GenerationOutcome, GenerationRequest, GenerationSuccess, RateLimited,
};
pub use quota::{GuestTokenCodec, QuotaCheck, QuotaLedger, UsageView};
pub use repository::{InMemoryUsageRepository, PostgresUsageRepository, UsageRepository};
