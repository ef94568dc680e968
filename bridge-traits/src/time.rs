//! Injectable time source.
//!
//! Watermarks are stamped in device-local time and queued reports carry a
//! creation timestamp, so both the instant and the local offset come from the
//! same [`Clock`].

use chrono::{DateTime, FixedOffset, Local, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time in the device's local timezone.
    fn now_local(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&Local).fixed_offset()
    }

    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant and offset.
#[derive(Debug, Clone)]
pub struct FixedClock {
    pub instant: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { instant, offset }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }

    fn now_local(&self) -> DateTime<FixedOffset> {
        self.instant.with_timezone(&self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_system_clock_millis_track_now() {
        let clock = SystemClock;
        let before = Utc::now().timestamp_millis();
        let millis = clock.unix_timestamp_millis();
        assert!(millis >= before);
    }

    #[test]
    fn test_fixed_clock_local_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        let wib = FixedOffset::east_opt(7 * 3600).unwrap();
        let clock = FixedClock::new(instant, wib);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.unix_timestamp_millis(), instant.timestamp_millis());
        // Crosses midnight into the next local day
        assert_eq!(
            clock.now_local().format("%d-%m-%Y %H:%M:%S").to_string(),
            "10-03-2024 06:30:00"
        );
    }
}
