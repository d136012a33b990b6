//! Unix seconds <-> zip (DOS) datetime, both in UTC.
//!
//! DOS time stores seconds / 2, so a round trip can lose up to one second. Dates outside the
//! DOS range (1980..=2107) are clamped to its ends.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use zip::DateTime;

const DOS_MIN_YEAR: i32 = 1980;
const DOS_MAX_YEAR: i32 = 2107;

pub fn to_zip_datetime(unix_secs: i64) -> DateTime {
    let t = OffsetDateTime::from_unix_timestamp(unix_secs).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    if t.year() < DOS_MIN_YEAR {
        return DateTime::default();
    }
    if t.year() > DOS_MAX_YEAR {
        return DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58).unwrap_or_default();
    }
    DateTime::from_date_and_time(
        t.year() as u16,
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
    )
    .unwrap_or_default()
}

pub fn from_zip_datetime(dt: &DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = Time::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}
