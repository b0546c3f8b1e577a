//! Plan tiers and the tier → limits lookup table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use validator::Validate;

/// Subscription plan stored on an authenticated usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
            Self::Enterprise => "ENTERPRISE",
        }
    }

    /// Parse the stored representation; unknown values fall back to FREE.
    pub fn from_stored(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PRO" => Self::Pro,
            "ENTERPRISE" => Self::Enterprise,
            _ => Self::Free,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key into [`PlanTable`]: guests have their own row next to the paid plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaTier {
    Guest,
    Plan(PlanTier),
}

impl fmt::Display for QuotaTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => write!(f, "GUEST"),
            Self::Plan(plan) => write!(f, "{plan}"),
        }
    }
}

/// What to do when a request would cross the monthly limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject unless the whole request fits
    #[default]
    Deny,
    /// Shrink the request to the remaining capacity; reject only at zero
    ClampToRemaining,
}

/// Limits for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PlanLimits {
    /// Units allowed per monthly accounting period
    pub monthly_limit: u32,
    /// Most units a single request may ask for
    #[validate(range(min = 1_u32))]
    pub per_request_cap: u32,
    /// Behaviour when a request does not fit the remaining budget
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl PlanLimits {
    pub const fn new(monthly_limit: u32, per_request_cap: u32, overflow: OverflowPolicy) -> Self {
        Self { monthly_limit, per_request_cap, overflow }
    }
}

/// Closed lookup table from tier to limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PlanTable {
    #[validate(nested)]
    #[serde(default = "default_guest_limits")]
    pub guest: PlanLimits,
    #[validate(nested)]
    #[serde(default = "default_free_limits")]
    pub free: PlanLimits,
    #[validate(nested)]
    #[serde(default = "default_pro_limits")]
    pub pro: PlanLimits,
    #[validate(nested)]
    #[serde(default = "default_enterprise_limits")]
    pub enterprise: PlanLimits,
}

impl Default for PlanTable {
    fn default() -> Self {
        Self {
            guest: default_guest_limits(),
            free: default_free_limits(),
            pro: default_pro_limits(),
            enterprise: default_enterprise_limits(),
        }
    }
}

impl PlanTable {
    pub const fn limits_for(&self, tier: QuotaTier) -> &PlanLimits {
        match tier {
            QuotaTier::Guest => &self.guest,
            QuotaTier::Plan(PlanTier::Free) => &self.free,
            QuotaTier::Plan(PlanTier::Pro) => &self.pro,
            QuotaTier::Plan(PlanTier::Enterprise) => &self.enterprise,
        }
    }
}

const fn default_guest_limits() -> PlanLimits {
    PlanLimits::new(5, 3, OverflowPolicy::Deny)
}

const fn default_free_limits() -> PlanLimits {
    PlanLimits::new(10, 3, OverflowPolicy::ClampToRemaining)
}

const fn default_pro_limits() -> PlanLimits {
    PlanLimits::new(100, 10, OverflowPolicy::ClampToRemaining)
}

const fn default_enterprise_limits() -> PlanLimits {
    PlanLimits::new(1000, 20, OverflowPolicy::ClampToRemaining)
}

/// Effective monthly limit after the promotional override is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyLimit {
    Limited(u32),
    Unlimited,
}

impl MonthlyLimit {
    pub const fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Units left before the limit is hit; `None` when unlimited.
    pub const fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Self::Limited(limit) => Some(limit.saturating_sub(used)),
            Self::Unlimited => None,
        }
    }
}

impl Serialize for MonthlyLimit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Limited(limit) => serializer.serialize_u32(*limit),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for MonthlyLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(limit) => Ok(Self::Limited(limit)),
            Raw::Text(s) if s.eq_ignore_ascii_case("unlimited") => Ok(Self::Unlimited),
            Raw::Text(other) => {
                Err(serde::de::Error::custom(format!("invalid monthly limit: {other}")))
            },
        }
    }
}
