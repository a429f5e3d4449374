use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Time source for the attendance core. The attendance day is always derived
/// here, never taken from the client.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// UTC offset of the attendance day boundary.
    fn offset(&self) -> FixedOffset;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Falls back to UTC when the offset is out of range (more than a day).
    pub fn with_offset_minutes(minutes: i32) -> Self {
        match minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
            Some(offset) => Self { offset },
            None => {
                tracing::warn!(minutes, "Invalid attendance UTC offset, using UTC");
                Self::utc()
            }
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct At(DateTime<Utc>, FixedOffset);

    impl Clock for At {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
        fn offset(&self) -> FixedOffset {
            self.1
        }
    }

    #[test]
    fn today_follows_configured_offset() {
        let late_utc = Utc.with_ymd_and_hms(2026, 3, 1, 22, 30, 0).unwrap();
        let utc = At(late_utc, Utc.fix());
        let ist = At(late_utc, FixedOffset::east_opt(330 * 60).unwrap());

        assert_eq!(utc.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(ist.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(SystemClock::with_offset_minutes(48 * 60).offset(), Utc.fix());
        assert_eq!(
            SystemClock::with_offset_minutes(-300).offset(),
            FixedOffset::west_opt(300 * 60).unwrap()
        );
    }
}
