//! Monthly usage records and snapshots.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::plan::{MonthlyLimit, PlanTier};

/// Accounting period identifier, formatted `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    /// Build a key; `month` is 1-based.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Period containing `at`, in the timezone `at` carries.
    pub fn of<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self { year: at.year(), month: at.month() }
    }

    pub const fn year(&self) -> i32 {
        self.year
    }

    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Parse `YYYY-MM`.
    pub fn parse(s: &str) -> Option<Self> {
        let (year, month) = s.trim().split_once('-')?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid period key: {value}"))
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

/// Server-side usage row for an authenticated identity and service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyUsageRecord {
    /// Opaque identity key (`user:<id>`)
    pub identity_key: String,
    /// Service the usage was spent on
    pub service_id: String,
    /// Subscription plan
    pub plan: PlanTier,
    /// Units consumed since `last_usage_reset`
    pub monthly_usage: u32,
    /// When the counter was last reset to zero
    pub last_usage_reset: DateTime<Utc>,
}

impl MonthlyUsageRecord {
    /// Fresh row for an identity that has never been charged.
    pub fn new(identity_key: impl Into<String>, service_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            identity_key: identity_key.into(),
            service_id: service_id.into(),
            plan: PlanTier::default(),
            monthly_usage: 0,
            last_usage_reset: now,
        }
    }
}

/// Guest usage carried inside the client-held token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUsage {
    /// Period the count belongs to
    pub period: PeriodKey,
    /// Units consumed in that period
    pub count: u32,
}

impl GuestUsage {
    pub const fn fresh(period: PeriodKey) -> Self {
        Self { period, count: 0 }
    }
}

/// Usage numbers returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub limit: MonthlyLimit,
    pub used: u32,
    /// `None` when the limit is unlimited
    pub remaining: Option<u32>,
}

impl UsageSnapshot {
    pub const fn new(limit: MonthlyLimit, used: u32) -> Self {
        Self { limit, used, remaining: limit.remaining(used) }
    }
}
