//! Month boundaries in a fixed reference timezone.

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc};
use creditgate_types::{ConfigError, PeriodKey};

/// Maps instants to accounting periods. All periods are calendar months in
/// one fixed UTC offset, so every identity rolls over at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCalendar {
    offset: FixedOffset,
}

impl Default for PeriodCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl PeriodCalendar {
    pub fn new(offset_minutes: i32) -> Result<Self, ConfigError> {
        offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| {
                ConfigError::invalid(
                    "quota.reference_utc_offset_minutes",
                    format!("{offset_minutes} is not a valid UTC offset"),
                )
            })
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn period_of(&self, at: DateTime<Utc>) -> PeriodKey {
        PeriodKey::of(&at.with_timezone(&self.offset))
    }

    /// First instant of the period containing `at`.
    pub fn period_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let local = at.with_timezone(&self.offset);
        self.offset
            .with_ymd_and_hms(local.year(), local.month(), 1, 0, 0, 0)
            .single()
            .map_or(at, |start| start.with_timezone(&Utc))
    }

    /// Whether a counter last reset at `last_reset` belongs to an earlier period.
    pub fn is_stale(&self, last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        last_reset < self.period_start(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).single().expect("valid")
    }

    #[test]
    fn test_period_start_utc() {
        let calendar = PeriodCalendar::utc();
        assert_eq!(calendar.period_start(utc(2026, 3, 17, 9)), utc(2026, 3, 1, 0));
        assert_eq!(calendar.period_of(utc(2026, 3, 17, 9)).to_string(), "2026-03");
    }

    #[test]
    fn test_offset_shifts_month_boundary() {
        // UTC+09:00: 2026-03-31T20:00Z is already April locally.
        let tokyo = PeriodCalendar::new(9 * 60).expect("valid offset");
        let at = utc(2026, 3, 31, 20);
        assert_eq!(tokyo.period_of(at).to_string(), "2026-04");
        assert_eq!(tokyo.period_start(at), utc(2026, 3, 31, 15));

        assert_eq!(PeriodCalendar::utc().period_of(at).to_string(), "2026-03");
    }

    #[test]
    fn test_is_stale_across_year_boundary() {
        let calendar = PeriodCalendar::utc();
        assert!(calendar.is_stale(utc(2025, 12, 31, 23), utc(2026, 1, 1, 0)));
        assert!(!calendar.is_stale(utc(2026, 1, 1, 0), utc(2026, 1, 31, 23)));
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        assert!(PeriodCalendar::new(24 * 60).is_err());
        assert!(PeriodCalendar::new(-5 * 60).is_ok());
    }
}
