//! Zoned timestamps for calendar events.
//!
//! Every event endpoint is an absolute instant paired with the IANA timezone
//! it was authored in. Comparisons and durations use the instant; rendering
//! and all-day date arithmetic use the zone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Quarter hours searched past a skipped midnight. DST gaps are at most two
/// hours.
const MIDNIGHT_GAP_STEPS: i64 = 12;

/// An absolute point in time with its associated IANA timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZonedTime {
    /// The instant, stored in UTC.
    pub instant: DateTime<Utc>,
    /// The timezone the time was expressed in.
    pub tz: Tz,
}

impl ZonedTime {
    /// Creates a zoned time from a UTC instant and a timezone.
    pub fn new(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self { instant, tz }
    }

    /// Creates a zoned time in UTC.
    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self::new(instant, Tz::UTC)
    }

    /// Creates a zoned time from any chrono datetime in a `chrono-tz` zone.
    pub fn from_zoned(dt: DateTime<Tz>) -> Self {
        Self::new(dt.with_timezone(&Utc), dt.timezone())
    }

    /// Resolves a wall-clock time in the given zone.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant.
    /// Returns `None` for times that do not exist (DST spring-forward gap).
    pub fn from_local(tz: Tz, local: NaiveDateTime) -> Option<Self> {
        tz.from_local_datetime(&local)
            .earliest()
            .map(Self::from_zoned)
    }

    /// Returns local midnight of `date` in `tz`.
    ///
    /// Zones that skip midnight on a DST transition (Havana, Santiago) use
    /// the first local time of that date that exists.
    pub fn at_midnight(date: NaiveDate, tz: Tz) -> Self {
        let local = date.and_time(NaiveTime::MIN);
        Self::from_local(tz, local)
            .or_else(|| {
                (1..=MIDNIGHT_GAP_STEPS)
                    .map(|step| local + Duration::minutes(15 * step))
                    .find_map(|later| Self::from_local(tz, later))
            })
            .unwrap_or_else(|| Self::new(local.and_utc(), tz))
    }

    /// Returns the instant expressed in its own timezone.
    pub fn local(&self) -> DateTime<Tz> {
        self.instant.with_timezone(&self.tz)
    }

    /// Returns the calendar date in the time's own timezone.
    pub fn date(&self) -> NaiveDate {
        self.local().date_naive()
    }

    /// Returns the IANA name of the timezone.
    pub fn tz_name(&self) -> &'static str {
        self.tz.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn local_rendering_uses_zone() {
        let t = ZonedTime::new(utc(2024, 1, 2, 9, 0), chrono_tz::America::New_York);
        let local = t.local();
        assert_eq!(local.hour(), 4);
        assert_eq!(t.tz_name(), "America/New_York");
    }

    #[test]
    fn date_follows_zone_not_utc() {
        // 02:00 UTC on Jan 3 is still Jan 2 in Los Angeles
        let t = ZonedTime::new(utc(2024, 1, 3, 2, 0), chrono_tz::America::Los_Angeles);
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn midnight_in_zone() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let t = ZonedTime::at_midnight(date, chrono_tz::Europe::Paris);
        assert_eq!(t.instant, utc(2024, 3, 14, 23, 0));
        assert_eq!(t.date(), date);
        assert_eq!(t.local().hour(), 0);
    }

    #[test]
    fn skipped_midnight_keeps_the_date() {
        // Havana jumps from 00:00 to 01:00 on 2024-03-10
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let t = ZonedTime::at_midnight(date, chrono_tz::America::Havana);
        assert_eq!(t.date(), date);
        assert_eq!(t.local().hour(), 1);
        assert_eq!(t.instant, utc(2024, 3, 10, 5, 0));
    }

    #[test]
    fn from_local_gap_is_none() {
        // 2024-03-10 02:30 does not exist in New York
        let local = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert!(ZonedTime::from_local(chrono_tz::America::New_York, local).is_none());
    }

    #[test]
    fn serde_round_trip() {
        let t = ZonedTime::new(utc(2024, 6, 1, 12, 0), chrono_tz::Asia::Tokyo);
        let json = serde_json::to_string(&t).unwrap();
        let back: ZonedTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.date().day(), 1);
    }
}
