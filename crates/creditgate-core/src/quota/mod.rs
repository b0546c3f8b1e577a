//! Monthly quota ledger.
//!
//! Two backing stores behind one contract: authenticated identities use the
//! [`UsageRepository`], guests carry their count in a signed client token.
//! Limits come from a closed [`PlanTable`] lookup; no plan strings are
//! compared here.

mod guest_token;
mod period;
mod promo;


pub use guest_token::GuestTokenCodec;
pub use period::PeriodCalendar;
pub use promo::PromotionalWindow;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use creditgate_types::models::{GuestTokenConfig, QuotaConfig};
use creditgate_types::{
    CallerIdentity, GuestUsage, MonthlyLimit, OverflowPolicy, PlanLimits, PlanTable, PlanTier,
    QuotaTier, UsageSnapshot,
};
use serde::Serialize;

use crate::error::AppResult;
use crate::repository::UsageRepository;

/// Result of [`QuotaLedger::check_remaining`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub tier: QuotaTier,
    pub limit: MonthlyLimit,
    pub used: u32,
    /// Requested units after the per-request cap
    pub requested_units: u32,
    /// Units the caller may generate now; 0 when denied
    pub granted_units: u32,
    pub promotional: bool,
    /// The usage store failed and the request was allowed without a reading
    pub degraded: bool,
}

impl QuotaCheck {
    pub const fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot::new(self.limit, self.used)
    }
}

/// Result of [`QuotaLedger::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Counter value after the increment
    pub used: u32,
    /// Plan on the committed record; `None` for guests
    pub plan: Option<PlanTier>,
    /// Re-issued guest token; `None` for authenticated identities
    pub guest_token: Option<String>,
}

/// Read-only usage view for the usage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageView {
    #[serde(flatten)]
    pub usage: UsageSnapshot,
    pub tier: QuotaTier,
    pub promotional: bool,
    /// The usage store could not be read; numbers are plan defaults
    pub degraded: bool,
}

/// Resolved usage state before any admission decision.
struct LedgerState {
    tier: QuotaTier,
    limits: PlanLimits,
    used: u32,
    promotional: bool,
    degraded: bool,
}

/// How [`QuotaLedger::resolve_state`] treats a record from a past period.
#[derive(Debug, Clone, Copy)]
enum Rollover {
    /// Persist the reset before deciding
    Apply,
    /// Report a zero count, leave the stored row alone
    Peek,
}

/// Units admitted for `requested` against `limit`, 0 when denied.
pub fn admit_units(limit: MonthlyLimit, used: u32, requested: u32, policy: OverflowPolicy) -> u32 {
    let Some(remaining) = limit.remaining(used) else {
        return requested;
    };
    match policy {
        OverflowPolicy::Deny if requested <= remaining => requested,
        OverflowPolicy::Deny => 0,
        OverflowPolicy::ClampToRemaining => requested.min(remaining),
    }
}

pub struct QuotaLedger {
    repository: Arc<dyn UsageRepository>,
    plans: PlanTable,
    calendar: PeriodCalendar,
    promo: PromotionalWindow,
    tokens: GuestTokenCodec,
}

impl QuotaLedger {
    pub fn new(
        repository: Arc<dyn UsageRepository>,
        plans: PlanTable,
        calendar: PeriodCalendar,
        promo: PromotionalWindow,
        tokens: GuestTokenCodec,
    ) -> Self {
        Self { repository, plans, calendar, promo, tokens }
    }

    pub fn from_config(
        repository: Arc<dyn UsageRepository>,
        quota: &QuotaConfig,
        guest_token: &GuestTokenConfig,
    ) -> AppResult<Self> {
        Ok(Self::new(
            repository,
            quota.plans.clone(),
            PeriodCalendar::new(quota.reference_utc_offset_minutes)?,
            PromotionalWindow::new(quota.promotional_window_days, quota.promotional_per_request_cap),
            GuestTokenCodec::from_config(guest_token)?,
        ))
    }

    pub const fn calendar(&self) -> &PeriodCalendar {
        &self.calendar
    }

    pub const fn tokens(&self) -> &GuestTokenCodec {
        &self.tokens
    }

    pub async fn check_remaining(
        &self,
        identity: &CallerIdentity,
        service_id: &str,
        requested_units: u32,
    ) -> QuotaCheck {
        self.check_remaining_at(identity, service_id, requested_units, Utc::now()).await
    }

    /// Admission decision. Runs the month rollover before reading the count.
    pub async fn check_remaining_at(
        &self,
        identity: &CallerIdentity,
        service_id: &str,
        requested_units: u32,
        now: DateTime<Utc>,
    ) -> QuotaCheck {
        let state = self.resolve_state(identity, service_id, now, Rollover::Apply).await;

        let cap = if state.promotional {
            state.limits.per_request_cap.max(self.promo.per_request_cap())
        } else {
            state.limits.per_request_cap
        };
        let requested = requested_units.clamp(1, cap.max(1));

        let limit = if state.promotional || state.degraded {
            MonthlyLimit::Unlimited
        } else {
            MonthlyLimit::Limited(state.limits.monthly_limit)
        };
        let granted = admit_units(limit, state.used, requested, state.limits.overflow);

        QuotaCheck {
            allowed: granted > 0,
            tier: state.tier,
            limit: if state.degraded {
                MonthlyLimit::Limited(state.limits.monthly_limit)
            } else {
                limit
            },
            used: state.used,
            requested_units: requested,
            granted_units: granted,
            promotional: state.promotional,
            degraded: state.degraded,
        }
    }

    pub async fn commit(
        &self,
        identity: &CallerIdentity,
        service_id: &str,
        actual_units: u32,
    ) -> AppResult<CommitReceipt> {
        self.commit_at(identity, service_id, actual_units, Utc::now()).await
    }

    /// Charge `actual_units` delivered units.
    ///
    /// Authenticated identities get a single atomic increment in the store.
    /// Guests get a re-issued token carrying the new count.
    pub async fn commit_at(
        &self,
        identity: &CallerIdentity,
        service_id: &str,
        actual_units: u32,
        now: DateTime<Utc>,
    ) -> AppResult<CommitReceipt> {
        match identity {
            CallerIdentity::Guest { cookie_token } => {
                let period = self.calendar.period_of(now);
                let mut usage = self
                    .tokens
                    .usage_for_period(cookie_token.as_deref(), &period)
                    .unwrap_or_else(|_| GuestUsage::fresh(period));
                usage.count = usage.count.saturating_add(actual_units);

                let token = self.tokens.encode(&usage)?;
                Ok(CommitReceipt { used: usage.count, plan: None, guest_token: Some(token) })
            },
            CallerIdentity::Authenticated { user_id } => {
                let key = CallerIdentity::user_key(user_id);
                let record = self
                    .repository
                    .atomic_increment(
                        &key,
                        service_id,
                        actual_units,
                        self.calendar.period_start(now),
                        now,
                    )
                    .await?;
                Ok(CommitReceipt {
                    used: record.monthly_usage,
                    plan: Some(record.plan),
                    guest_token: None,
                })
            },
        }
    }

    /// Limit to report after a successful commit.
    ///
    /// The committed record is authoritative for the plan: a degraded check
    /// only carried FREE defaults.
    pub fn limit_after_commit(&self, check: &QuotaCheck, receipt: &CommitReceipt) -> MonthlyLimit {
        if check.promotional {
            return MonthlyLimit::Unlimited;
        }
        match receipt.plan {
            Some(plan) => {
                MonthlyLimit::Limited(self.plans.limits_for(QuotaTier::Plan(plan)).monthly_limit)
            },
            None => check.limit,
        }
    }

    pub async fn usage(&self, identity: &CallerIdentity, service_id: &str) -> UsageView {
        self.usage_at(identity, service_id, Utc::now()).await
    }

    /// Current usage without an admission decision.
    pub async fn usage_at(
        &self,
        identity: &CallerIdentity,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> UsageView {
        let state = self.resolve_state(identity, service_id, now, Rollover::Peek).await;
        let limit = if state.promotional {
            MonthlyLimit::Unlimited
        } else {
            MonthlyLimit::Limited(state.limits.monthly_limit)
        };
        UsageView {
            usage: UsageSnapshot::new(limit, state.used),
            tier: state.tier,
            promotional: state.promotional,
            degraded: state.degraded,
        }
    }

    async fn resolve_state(
        &self,
        identity: &CallerIdentity,
        service_id: &str,
        now: DateTime<Utc>,
        rollover: Rollover,
    ) -> LedgerState {
        match identity {
            CallerIdentity::Guest { cookie_token } => {
                let period = self.calendar.period_of(now);
                let usage = self.tokens.resolve(cookie_token.as_deref(), &period);
                LedgerState {
                    tier: QuotaTier::Guest,
                    limits: *self.plans.limits_for(QuotaTier::Guest),
                    used: usage.count,
                    promotional: false,
                    degraded: false,
                }
            },
            CallerIdentity::Authenticated { user_id } => {
                let key = CallerIdentity::user_key(user_id);
                let period_start = self.calendar.period_start(now);
                let read = match rollover {
                    Rollover::Apply => {
                        self.repository.reset_if_stale(&key, service_id, period_start, now).await
                    },
                    Rollover::Peek => {
                        self.repository.get_or_create(&key, service_id, now).await.map(|mut r| {
                            if r.last_usage_reset < period_start {
                                r.monthly_usage = 0;
                            }
                            r
                        })
                    },
                };
                let record = match read {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(
                            "Usage read failed for {} on {}, allowing request: {}",
                            key,
                            service_id,
                            e
                        );
                        let tier = QuotaTier::Plan(PlanTier::Free);
                        return LedgerState {
                            tier,
                            limits: *self.plans.limits_for(tier),
                            used: 0,
                            promotional: false,
                            degraded: true,
                        };
                    },
                };

                let promotional = match self.repository.first_seen(&key, now).await {
                    Ok(first_seen) => self.promo.is_active(first_seen, now),
                    Err(e) => {
                        tracing::warn!("First-seen lookup failed for {}: {}", key, e);
                        false
                    },
                };

                let tier = QuotaTier::Plan(record.plan);
                LedgerState {
                    tier,
                    limits: *self.plans.limits_for(tier),
                    used: record.monthly_usage,
                    promotional,
                    degraded: false,
                }
            },
        }
    }
}
