use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, RwLock};

/// Time source for every window computation in the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(RwLock::new(instant)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = match self.instant.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let current = self.now();
        self.set(current + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.instant.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Returns the clock's current time in the configured timezone.
pub fn now_in_timezone(clock: &dyn Clock, tz: &Tz) -> DateTime<Tz> {
    clock.now().with_timezone(tz)
}

/// Returns the clock's current date in the configured timezone.
pub fn today_local(clock: &dyn Clock, tz: &Tz) -> NaiveDate {
    now_in_timezone(clock, tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Timelike};

    #[test]
    fn now_in_timezone_returns_datetime_in_tz() {
        let clock = SystemClock;
        let tz = chrono_tz::UTC;
        let result = now_in_timezone(&clock, &tz);
        assert_eq!(result.timezone(), tz);
    }

    #[test]
    fn system_clock_is_close_to_utc_now() {
        let result = SystemClock.now();
        let diff = (result - Utc::now()).num_seconds().abs();
        assert!(diff < 2, "Difference should be less than 2 seconds");
    }

    #[test]
    fn fixed_clock_can_be_set_and_advanced() {
        let start = Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(15));
        assert_eq!(clock.now(), start + Duration::minutes(15));

        let shared = clock.clone();
        shared.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn today_local_respects_timezone_offset() {
        // 20:00 UTC on the 6th is already the 7th in Tokyo.
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 4, 6, 20, 0, 0).unwrap());
        let tokyo = chrono_tz::Asia::Tokyo;
        assert_eq!(
            today_local(&clock, &tokyo),
            NaiveDate::from_ymd_opt(2025, 4, 7).unwrap()
        );
        assert_eq!(now_in_timezone(&clock, &tokyo).hour(), 5);
    }
}
