//! Promotional window after an identity's first activity.

use chrono::{DateTime, Duration, Utc};

/// While active, the monthly count is unlimited but each request is still
/// capped at `per_request_cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionalWindow {
    duration: Duration,
    per_request_cap: u32,
}

impl PromotionalWindow {
    pub fn new(days: u32, per_request_cap: u32) -> Self {
        Self { duration: Duration::days(i64::from(days)), per_request_cap }
    }

    pub fn disabled() -> Self {
        Self::new(0, 1)
    }

    pub const fn per_request_cap(&self) -> u32 {
        self.per_request_cap
    }

    pub fn is_active(&self, first_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(first_seen) < self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_boundaries() {
        let window = PromotionalWindow::new(7, 10);
        let first = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().expect("valid");

        assert!(window.is_active(first, first));
        assert!(window.is_active(first, first + Duration::days(7) - Duration::seconds(1)));
        assert!(!window.is_active(first, first + Duration::days(7)));
    }

    #[test]
    fn test_disabled_window_never_active() {
        let now = Utc::now();
        assert!(!PromotionalWindow::disabled().is_active(now, now));
    }
}
