//! In-process usage repository, used when no database is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creditgate_types::{MonthlyUsageRecord, PlanTier};
use dashmap::DashMap;

use super::{RepoResult, UsageRepository};

type RecordKey = (String, String);

/// DashMap-backed repository. The shard lock held by `entry()` is the
/// single-record transaction.
#[derive(Default)]
pub struct InMemoryUsageRepository {
    records: DashMap<RecordKey, MonthlyUsageRecord>,
    first_seen: DashMap<String, DateTime<Utc>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(identity_key: &str, service_id: &str) -> RecordKey {
        (identity_key.to_string(), service_id.to_string())
    }

    /// Overwrite a record wholesale (seeding for tests and imports).
    pub fn insert(&self, record: MonthlyUsageRecord) {
        let key = Self::key(&record.identity_key, &record.service_id);
        self.records.insert(key, record);
    }

    /// Backdate an identity's first activity.
    pub fn set_first_seen(&self, identity_key: &str, at: DateTime<Utc>) {
        self.first_seen.insert(identity_key.to_string(), at);
    }

    /// Snapshot without creating.
    pub fn get(&self, identity_key: &str, service_id: &str) -> Option<MonthlyUsageRecord> {
        self.records.get(&Self::key(identity_key, service_id)).map(|r| r.clone())
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn get_or_create(
        &self,
        identity_key: &str,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        let entry = self
            .records
            .entry(Self::key(identity_key, service_id))
            .or_insert_with(|| MonthlyUsageRecord::new(identity_key, service_id, now));
        Ok(entry.clone())
    }

    async fn reset_if_stale(
        &self,
        identity_key: &str,
        service_id: &str,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        let mut entry = self
            .records
            .entry(Self::key(identity_key, service_id))
            .or_insert_with(|| MonthlyUsageRecord::new(identity_key, service_id, now));

        if entry.last_usage_reset < period_start {
            entry.monthly_usage = 0;
            entry.last_usage_reset = now;
        }
        Ok(entry.clone())
    }

    async fn atomic_increment(
        &self,
        identity_key: &str,
        service_id: &str,
        amount: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        let mut entry = self
            .records
            .entry(Self::key(identity_key, service_id))
            .or_insert_with(|| MonthlyUsageRecord::new(identity_key, service_id, now));

        if entry.last_usage_reset < period_start {
            entry.monthly_usage = amount;
            entry.last_usage_reset = now;
        } else {
            entry.monthly_usage = entry.monthly_usage.saturating_add(amount);
        }
        Ok(entry.clone())
    }

    async fn first_seen(
        &self,
        identity_key: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<DateTime<Utc>> {
        Ok(*self.first_seen.entry(identity_key.to_string()).or_insert(now))
    }

    async fn set_plan(
        &self,
        identity_key: &str,
        service_id: &str,
        plan: PlanTier,
    ) -> RepoResult<()> {
        let now = Utc::now();
        self.records
            .entry(Self::key(identity_key, service_id))
            .or_insert_with(|| MonthlyUsageRecord::new(identity_key, service_id, now))
            .plan = plan;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).single().expect("valid date")
    }

    #[tokio::test]
    async fn test_get_or_create_defaults() {
        let repo = InMemoryUsageRepository::new();
        let record = repo.get_or_create("user:1", "banner", at(2026, 3, 4)).await.expect("ok");

        assert_eq!(record.plan, PlanTier::Free);
        assert_eq!(record.monthly_usage, 0);
        assert_eq!(record.last_usage_reset, at(2026, 3, 4));
    }

    #[tokio::test]
    async fn test_reset_if_stale_only_resets_old_periods() {
        let repo = InMemoryUsageRepository::new();
        let mut record = MonthlyUsageRecord::new("user:1", "copy", at(2026, 2, 20));
        record.monthly_usage = 7;
        repo.insert(record);

        let same = repo
            .reset_if_stale("user:1", "copy", at(2026, 2, 1), at(2026, 2, 25))
            .await
            .expect("ok");
        assert_eq!(same.monthly_usage, 7);

        let rolled = repo
            .reset_if_stale("user:1", "copy", at(2026, 3, 1), at(2026, 3, 2))
            .await
            .expect("ok");
        assert_eq!(rolled.monthly_usage, 0);
        assert_eq!(rolled.last_usage_reset, at(2026, 3, 2));
    }

    #[tokio::test]
    async fn test_increment_restarts_stale_period() {
        let repo = InMemoryUsageRepository::new();
        let mut record = MonthlyUsageRecord::new("user:1", "chat", at(2026, 1, 10));
        record.monthly_usage = 9;
        repo.insert(record);

        let updated = repo
            .atomic_increment("user:1", "chat", 2, at(2026, 2, 1), at(2026, 2, 3))
            .await
            .expect("ok");
        assert_eq!(updated.monthly_usage, 2);
    }

    #[tokio::test]
    async fn test_first_seen_is_sticky() {
        let repo = InMemoryUsageRepository::new();
        let first = repo.first_seen("user:1", at(2026, 1, 1)).await.expect("ok");
        let again = repo.first_seen("user:1", at(2026, 1, 1) + Duration::days(3)).await.expect("ok");
        assert_eq!(first, again);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let repo = Arc::new(InMemoryUsageRepository::new());
        let period_start = at(2026, 5, 1);
        let now = at(2026, 5, 2);

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.atomic_increment("user:7", "banner", 3, period_start, now).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task").expect("increment");
        }

        assert_eq!(repo.get("user:7", "banner").expect("exists").monthly_usage, 120);
    }
}
