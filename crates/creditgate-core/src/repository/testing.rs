//! Repository doubles for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creditgate_types::{MonthlyUsageRecord, PlanTier};

use super::{InMemoryUsageRepository, RepoResult, RepositoryError, UsageRepository};

/// Every call fails as if the database were unreachable.
pub struct FailingRepository;

#[async_trait]
impl UsageRepository for FailingRepository {
    async fn get_or_create(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        Err(RepositoryError::Database("connection refused".to_string()))
    }

    async fn reset_if_stale(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        Err(RepositoryError::Database("connection refused".to_string()))
    }

    async fn atomic_increment(
        &self,
        _: &str,
        _: &str,
        _: u32,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        Err(RepositoryError::Database("connection refused".to_string()))
    }

    async fn first_seen(&self, _: &str, _: DateTime<Utc>) -> RepoResult<DateTime<Utc>> {
        Err(RepositoryError::Database("connection refused".to_string()))
    }

    async fn set_plan(&self, _: &str, _: &str, _: PlanTier) -> RepoResult<()> {
        Err(RepositoryError::Database("connection refused".to_string()))
    }
}

/// Record reads fail, increments and everything else reach `inner`.
pub struct ReadFailingRepository {
    pub inner: InMemoryUsageRepository,
}

impl ReadFailingRepository {
    pub fn new(inner: InMemoryUsageRepository) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UsageRepository for ReadFailingRepository {
    async fn get_or_create(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        Err(RepositoryError::Database("read timed out".to_string()))
    }

    async fn reset_if_stale(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        Err(RepositoryError::Database("read timed out".to_string()))
    }

    async fn atomic_increment(
        &self,
        identity_key: &str,
        service_id: &str,
        amount: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        self.inner.atomic_increment(identity_key, service_id, amount, period_start, now).await
    }

    async fn first_seen(
        &self,
        identity_key: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<DateTime<Utc>> {
        self.inner.first_seen(identity_key, now).await
    }

    async fn set_plan(
        &self,
        identity_key: &str,
        service_id: &str,
        plan: PlanTier,
    ) -> RepoResult<()> {
        self.inner.set_plan(identity_key, service_id, plan).await
    }
}
