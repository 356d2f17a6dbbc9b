//! KST trading-hours window.
//!
//! The risk monitor only runs while the market can actually move. The
//! window opens before the regular session (pre-open auction) and closes
//! one minute after the 15:30 close.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// KST is a fixed +09:00 offset, no DST.
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Daily monitoring window in KST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 40, 0).unwrap(),
            close: NaiveTime::from_hms_opt(15, 31, 0).unwrap(),
        }
    }
}

impl MarketHours {
    /// Check whether a UTC instant falls inside the KST window on a weekday.
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let offset = FixedOffset::east_opt(KST_OFFSET_SECS).unwrap();
        let kst = at.with_timezone(&offset);

        if matches!(kst.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let t = kst.time();
        t >= self.open && t < self.close
    }

    /// Check against the current wall clock.
    pub fn is_open_now(&self) -> bool {
        self.is_open_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        // Build in UTC by subtracting the KST offset
        let offset = FixedOffset::east_opt(KST_OFFSET_SECS).unwrap();
        offset
            .with_ymd_and_hms(year, month, day, hour, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_open_during_session() {
        let hours = MarketHours::default();
        // 2026-08-05 is Wednesday
        assert!(hours.is_open_at(kst(2026, 8, 5, 9, 0)));
        assert!(hours.is_open_at(kst(2026, 8, 5, 15, 30)));
    }

    #[test]
    fn test_closed_outside_session() {
        let hours = MarketHours::default();
        assert!(!hours.is_open_at(kst(2026, 8, 5, 8, 39)));
        assert!(!hours.is_open_at(kst(2026, 8, 5, 15, 31)));
        assert!(!hours.is_open_at(kst(2026, 8, 5, 22, 0)));
    }

    #[test]
    fn test_closed_on_weekend() {
        let hours = MarketHours::default();
        // 2026-08-08 is Saturday, 08-09 Sunday
        assert!(!hours.is_open_at(kst(2026, 8, 8, 10, 0)));
        assert!(!hours.is_open_at(kst(2026, 8, 9, 10, 0)));
    }

    #[test]
    fn test_window_boundary_is_half_open() {
        let hours = MarketHours::default();
        assert!(hours.is_open_at(kst(2026, 8, 5, 8, 40)));
        assert!(!hours.is_open_at(kst(2026, 8, 5, 15, 31)));
    }
}
