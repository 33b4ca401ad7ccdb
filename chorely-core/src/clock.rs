//! Wall-clock and business-calendar access.
//!
//! Every "today" in the settlement engine comes from a [`Clock`] read through a
//! [`BusinessCalendar`], so tests can pin the instant and the timezone policy is
//! one configured value.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Maps instants onto calendar days of the configured business timezone.
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    tz: Tz,
}

impl BusinessCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.date_of(clock.now())
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Shanghai)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_today_follows_business_timezone() {
        // 17:30 UTC is already the next day in UTC+8.
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 17, 30, 0).unwrap());
        let shanghai = BusinessCalendar::default();
        let utc = BusinessCalendar::new(chrono_tz::UTC);

        assert_eq!(shanghai.today(&clock), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(utc.today(&clock), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_fixed_clock_advance() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(36));
        assert_eq!(clock.now(), start + Duration::hours(36));
    }
}
