use chrono::{DateTime, Datelike, Duration, Utc};

/// Source of "now" for everything that depends on the current date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn current_year(&self) -> i32 {
        self.now().year()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Describes when something was published, relative to the UTC calendar day of `now`.
pub fn label_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let day = ts.date_naive();
    let today = now.date_naive();

    if day == today {
        "Published today".to_string()
    } else if day == today - Duration::days(1) {
        "Published yesterday".to_string()
    } else {
        format!("Published on {}", day.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_label_today() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();
        assert_eq!(label_relative(ts, now()), "Published today");
    }

    #[test]
    fn test_label_yesterday() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 23, 0, 0).unwrap();
        assert_eq!(label_relative(ts, now()), "Published yesterday");
    }

    #[test]
    fn test_label_older() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(label_relative(ts, now()), "Published on 2024-01-01");
    }

    #[test]
    fn test_label_future_date_is_absolute() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(label_relative(ts, now()), "Published on 2024-03-11");
    }

    #[test]
    fn test_fixed_clock_year() {
        assert_eq!(FixedClock(now()).current_year(), 2024);
    }
}
