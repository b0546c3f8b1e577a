//! PostgreSQL implementation of the usage repository.
//!
//! Every method is one statement. Period rollover and increment happen inside
//! the same `UPDATE`, so concurrent commits serialize on the row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creditgate_types::{MonthlyUsageRecord, PlanTier};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use super::{RepoResult, RepositoryError, UsageRepository};

const RECORD_COLUMNS: &str = "identity_key, service_id, plan, monthly_usage, last_usage_reset";

/// PostgreSQL-backed usage repository.
pub struct PostgresUsageRepository {
    /// Database connection pool.
    pool: PgPool,
}

impl PostgresUsageRepository {
    /// Create repository with existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connect to database and create repository.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| RepositoryError::Database(err.to_string()))
    }
}

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
        other => RepositoryError::Database(other.to_string()),
    }
}

fn to_db_units(amount: u32) -> RepoResult<i32> {
    i32::try_from(amount)
        .map_err(|_| RepositoryError::Serialization(format!("unit amount {amount} overflows")))
}

fn row_to_record(row: &PgRow) -> RepoResult<MonthlyUsageRecord> {
    let plan: String = row.get("plan");
    let usage: i32 = row.get("monthly_usage");
    let monthly_usage = u32::try_from(usage)
        .map_err(|_| RepositoryError::Serialization(format!("negative monthly_usage {usage}")))?;

    Ok(MonthlyUsageRecord {
        identity_key: row.get("identity_key"),
        service_id: row.get("service_id"),
        plan: PlanTier::from_stored(&plan),
        monthly_usage,
        last_usage_reset: row.get("last_usage_reset"),
    })
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn get_or_create(
        &self,
        identity_key: &str,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        let sql = format!(
            r#"INSERT INTO usage_records (identity_key, service_id, plan, monthly_usage, last_usage_reset)
               VALUES ($1, $2, 'FREE', 0, $3)
               ON CONFLICT (identity_key, service_id)
               DO UPDATE SET identity_key = EXCLUDED.identity_key
               RETURNING {RECORD_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(identity_key)
            .bind(service_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row_to_record(&row)
    }

    async fn reset_if_stale(
        &self,
        identity_key: &str,
        service_id: &str,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        let sql = format!(
            r#"INSERT INTO usage_records (identity_key, service_id, plan, monthly_usage, last_usage_reset)
               VALUES ($1, $2, 'FREE', 0, $4)
               ON CONFLICT (identity_key, service_id) DO UPDATE SET
                   monthly_usage = CASE WHEN usage_records.last_usage_reset < $3
                                        THEN 0 ELSE usage_records.monthly_usage END,
                   last_usage_reset = CASE WHEN usage_records.last_usage_reset < $3
                                           THEN $4 ELSE usage_records.last_usage_reset END
               RETURNING {RECORD_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(identity_key)
            .bind(service_id)
            .bind(period_start)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row_to_record(&row)
    }

    async fn atomic_increment(
        &self,
        identity_key: &str,
        service_id: &str,
        amount: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RepoResult<MonthlyUsageRecord> {
        let sql = format!(
            r#"INSERT INTO usage_records (identity_key, service_id, plan, monthly_usage, last_usage_reset)
               VALUES ($1, $2, 'FREE', $3, $5)
               ON CONFLICT (identity_key, service_id) DO UPDATE SET
                   monthly_usage = CASE WHEN usage_records.last_usage_reset < $4
                                        THEN $3 ELSE usage_records.monthly_usage + $3 END,
                   last_usage_reset = CASE WHEN usage_records.last_usage_reset < $4
                                           THEN $5 ELSE usage_records.last_usage_reset END
               RETURNING {RECORD_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(identity_key)
            .bind(service_id)
            .bind(to_db_units(amount)?)
            .bind(period_start)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row_to_record(&row)
    }

    async fn first_seen(
        &self,
        identity_key: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<DateTime<Utc>> {
        let row = sqlx::query(
            r#"INSERT INTO identities (identity_key, first_seen_at) VALUES ($1, $2)
               ON CONFLICT (identity_key) DO UPDATE SET identity_key = EXCLUDED.identity_key
               RETURNING first_seen_at"#,
        )
        .bind(identity_key)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.get("first_seen_at"))
    }

    async fn set_plan(
        &self,
        identity_key: &str,
        service_id: &str,
        plan: PlanTier,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO usage_records (identity_key, service_id, plan, monthly_usage, last_usage_reset)
               VALUES ($1, $2, $3, 0, NOW())
               ON CONFLICT (identity_key, service_id) DO UPDATE SET plan = EXCLUDED.plan"#,
        )
        .bind(identity_key)
        .bind(service_id)
        .bind(plan.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}
