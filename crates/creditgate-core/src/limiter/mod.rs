//! Per-IP fixed-window admission.
//!
//! Keyed on IP rather than identity so that accounts sharing an address are
//! still throttled together. The read-check-increment for a key runs under
//! that key's DashMap shard lock, so concurrent requests cannot both observe
//! "under limit" for the same record.

use std::time::{Duration, Instant};

use creditgate_types::models::RateLimitConfig;
use dashmap::DashMap;


/// Outcome of [`RateLimiter::admit`]. Denial is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed {
        /// Requests left in the current window
        remaining: u32,
    },
    Denied {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl Admission {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

struct RateLimitRecord {
    count: u32,
    window_reset_at: Instant,
}

impl RateLimitRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.window_reset_at
    }
}

/// In-memory fixed-window limiter. Single-process only.
pub struct RateLimiter {
    records: DashMap<String, RateLimitRecord>,
    window: Duration,
    guest_max: u32,
    authenticated_max: u32,
    cleanup_threshold: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            records: DashMap::new(),
            window: Duration::from_secs(config.window_secs),
            guest_max: config.guest_max_requests,
            authenticated_max: config.authenticated_max_requests,
            cleanup_threshold: config.cleanup_threshold,
        }
    }

    /// Admit or deny one request from `ip_key`.
    ///
    /// `authenticated` selects the higher per-window maximum; it is supplied by
    /// the caller instead of being derived from an identity.
    pub fn admit(&self, ip_key: &str, authenticated: bool) -> Admission {
        self.admit_at(ip_key, authenticated, Instant::now())
    }

    pub fn admit_at(&self, ip_key: &str, authenticated: bool, now: Instant) -> Admission {
        self.cleanup_if_needed(now);

        let maximum = if authenticated { self.authenticated_max } else { self.guest_max };

        let mut entry = self
            .records
            .entry(ip_key.to_string())
            .or_insert_with(|| RateLimitRecord { count: 0, window_reset_at: now + self.window });

        if entry.is_expired(now) {
            entry.count = 0;
            entry.window_reset_at = now + self.window;
        }

        if entry.count >= maximum {
            let retry_after = entry.window_reset_at.saturating_duration_since(now);
            tracing::debug!(
                "Rate limit hit for {}: {}/{} (retry in {}s)",
                ip_key,
                entry.count,
                maximum,
                retry_after.as_secs()
            );
            return Admission::Denied { retry_after };
        }

        entry.count = entry.count.saturating_add(1);
        Admission::Allowed { remaining: maximum.saturating_sub(entry.count) }
    }

    /// Number of tracked IPs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn cleanup_if_needed(&self, now: Instant) {
        if self.records.len() > self.cleanup_threshold {
            self.records.retain(|_, record| !record.is_expired(now));
        }
    }
}
