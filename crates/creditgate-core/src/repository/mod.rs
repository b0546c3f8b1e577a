//! Usage repository trait for storage abstraction.
//!
//! Every operation is a single-record transaction: implementations must give
//! read-your-writes consistency per `(identity_key, service_id)` and must
//! never lose an increment under concurrent callers.

mod memory;
mod postgres;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::InMemoryUsageRepository;
pub use postgres::PostgresUsageRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creditgate_types::{MonthlyUsageRecord, PlanTier};

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Usage record not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Fetch the record, inserting a FREE/zero row stamped `now` if absent.
    async fn get_or_create(
        &self,
        identity_key: &str,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord>;

    /// Zero the counter if `last_usage_reset` is before `period_start`.
    async fn reset_if_stale(
        &self,
        identity_key: &str,
        service_id: &str,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord>;

    /// Add `amount` in one step. A stale period restarts the counter at `amount`.
    async fn atomic_increment(
        &self,
        identity_key: &str,
        service_id: &str,
        amount: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord>;

    /// First observed activity for the identity, recording `now` on first call.
    async fn first_seen(&self, identity_key: &str, now: DateTime<Utc>)
        -> RepoResult<DateTime<Utc>>;

    /// Change the plan on a record, creating it if needed.
    async fn set_plan(&self, identity_key: &str, service_id: &str, plan: PlanTier)
        -> RepoResult<()>;
}
