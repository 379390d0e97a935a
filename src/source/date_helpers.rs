use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use crate::constants::mjd::{EPOCH_DAY, EPOCH_MONTH, EPOCH_YEAR};
use crate::constants::registry::{DAY_FORMAT, TIMESTAMP_FORMAT};
use crate::types::DayInt;

/// Parse a `YYYY-MM-DD` day. Returns `None` when parsing fails.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DAY_FORMAT).ok()
}

/// Pack a day as a `YYYYMMDD` integer (e.g. `20100513`).
pub fn day_as_int(day: NaiveDate) -> DayInt {
    // Years before 0 never occur in detector data; clamp rather than wrap.
    let year = day.year().max(0) as u32;
    year * 10_000 + day.month() * 100 + day.day()
}

/// Unpack a `YYYYMMDD` integer into a day.
pub fn day_from_int(value: DayInt) -> Option<NaiveDate> {
    let year = i32::try_from(value / 10_000).ok()?;
    NaiveDate::from_ymd_opt(year, (value / 100) % 100, value % 100)
}

/// Parse a window bound given either as `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_day_bound(value: &str) -> Option<DayInt> {
    let trimmed = value.trim();
    if let Some(day) = parse_day(trimmed) {
        return Some(day_as_int(day));
    }
    let packed = trimmed.parse::<DayInt>().ok()?;
    day_from_int(packed).map(day_as_int)
}

/// Parse a registry timestamp at second precision.
///
/// Fractional seconds are discarded and either a space or `T` may separate
/// the date from the time (`2011-05-13 12:34:56.789`, `2011-05-13T12:34:56`).
pub fn parse_registry_timestamp(value: &str) -> Option<NaiveDateTime> {
    let whole_seconds = value.trim().split('.').next()?;
    let normalized = whole_seconds.replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT).ok()
}

/// Calendar day containing the given modified Julian date.
pub fn day_from_mjd(mjd: f64) -> Option<NaiveDate> {
    if !mjd.is_finite() || mjd < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(EPOCH_YEAR, EPOCH_MONTH, EPOCH_DAY)?;
    epoch.checked_add_days(Days::new(mjd.floor() as u64))
}

/// Extract the day from a map file name ending in `_YYYY-MM-DD.<ext>`.
///
/// Example: `IC86-2011_24H_sid_2011-05-14.fits`.
pub fn day_from_map_file_name(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let (_, tail) = stem.rsplit_once('_')?;
    parse_day(tail)
}
