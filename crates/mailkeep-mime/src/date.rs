//! Sent-date parsing and the date formats used by backups.
//!
//! The `Date` header is read for its wall-clock fields only; the zone offset
//! is ignored, so a message keeps the calendar date its sender saw. Fields
//! are clamped into range before a timestamp is built, and anything that
//! cannot be read at all becomes the Unix epoch.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

#[allow(clippy::expect_used)]
static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,2})\s+([a-z]{3})[a-z]*\.?,?\s+(\d{2,4})(?:\s+(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?)?",
    )
    .expect("valid date regex")
});

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Calendar fields as written in a header, before any range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDate {
    /// Year, with two-digit years already expanded.
    pub year: i64,
    /// Month, 1-based.
    pub month: i64,
    /// Day of month.
    pub day: i64,
    /// Hour.
    pub hour: i64,
    /// Minute.
    pub minute: i64,
    /// Second.
    pub second: i64,
}

/// The fallback date for unreadable headers.
#[must_use]
pub const fn epoch() -> NaiveDateTime {
    NaiveDateTime::UNIX_EPOCH
}

/// Extracts the calendar fields from a `Date` header value.
///
/// Accepts the RFC 5322 form with or without a weekday, full month names,
/// two-digit years (`69`-`99` map to the 1900s, the rest to the 2000s) and a
/// missing time of day.
#[must_use]
pub fn parse_fields(value: &str) -> Option<RawDate> {
    let caps = DATE.captures(value)?;
    let number = |i: usize| -> Option<i64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };

    let month_name = caps.get(2)?.as_str();
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month_name))?;

    let mut year = number(3)?;
    if year < 100 {
        year += if year > 68 { 1900 } else { 2000 };
    }

    Some(RawDate {
        year,
        month: i64::try_from(month).ok()? + 1,
        day: number(1)?,
        hour: number(4)?,
        minute: number(5)?,
        second: number(6)?,
    })
}

/// Clamps each field into its valid range and builds a timestamp.
///
/// The year is held to 1970-9999. A day past the end of its month rolls into
/// the next month, the way `mktime` normalises it. If the result still
/// cannot be represented, the epoch is returned.
#[must_use]
pub fn clamp(raw: RawDate) -> NaiveDateTime {
    let field = |value: i64, min: i64, max: i64| -> u32 {
        u32::try_from(value.clamp(min, max)).unwrap_or(0)
    };

    let year = i32::try_from(raw.year.clamp(1970, 9999)).unwrap_or(1970);
    let month = field(raw.month, 1, 12);
    let day = field(raw.day, 1, 31);

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(day - 1))))
        .and_then(|date| {
            date.and_hms_opt(
                field(raw.hour, 0, 23),
                field(raw.minute, 0, 59),
                field(raw.second, 0, 59),
            )
        })
        .unwrap_or_else(epoch)
}

/// Parses a `Date` header value, falling back to the epoch.
#[must_use]
pub fn sent_date(value: Option<&str>) -> NaiveDateTime {
    value.and_then(parse_fields).map_or_else(epoch, clamp)
}

fn month_name(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Jan")
}

/// Formats a date for SEARCH SINCE/BEFORE: `01-May-2020`.
#[must_use]
pub fn search_date(date: NaiveDate) -> String {
    format!(
        "{:02}-{}-{:04}",
        date.day(),
        month_name(date.month()),
        date.year()
    )
}

/// Formats an APPEND internal date: `01-May-2020 10:00:00 +0000`.
#[must_use]
pub fn internal_date(at: NaiveDateTime) -> String {
    format!(
        "{} {:02}:{:02}:{:02} +0000",
        search_date(at.date()),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Formats a watermark stamp: `20200501`.
#[must_use]
pub fn stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parses a watermark stamp written by [`stamp`].
#[must_use]
pub fn parse_stamp(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y%m%d").ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_rfc5322_date() {
        assert_eq!(
            sent_date(Some("Fri, 1 May 2020 10:11:12 +0200")),
            at(2020, 5, 1, 10, 11, 12)
        );
        assert_eq!(
            sent_date(Some("01 May 2020 23:59:00 -0700 (PDT)")),
            at(2020, 5, 1, 23, 59, 0)
        );
    }

    #[test]
    fn test_loose_forms() {
        assert_eq!(sent_date(Some("Tue, 3 June 08 9:05 GMT")), at(2008, 6, 3, 9, 5, 0));
        assert_eq!(sent_date(Some("3 Mar 99")), at(1999, 3, 3, 0, 0, 0));
    }

    #[test]
    fn test_missing_or_garbage_is_epoch() {
        assert_eq!(sent_date(None), epoch());
        assert_eq!(sent_date(Some("yesterday-ish")), epoch());
        assert_eq!(sent_date(Some("1 Foo 2020 10:00:00")), epoch());
    }

    #[test]
    fn test_clamping() {
        // year before the epoch, hour and minute out of range
        assert_eq!(
            sent_date(Some("5 Jan 1901 25:61:00 +0000")),
            at(1970, 1, 5, 23, 59, 0)
        );
        assert_eq!(
            clamp(RawDate {
                year: 123_456,
                month: 0,
                day: 0,
                hour: -3,
                minute: 0,
                second: 99,
            }),
            at(9999, 1, 1, 0, 0, 59)
        );
    }

    #[test]
    fn test_day_overflow_rolls_forward() {
        assert_eq!(sent_date(Some("31 Feb 2021 12:00:00")), at(2021, 3, 3, 12, 0, 0));
    }

    #[test]
    fn test_formats() {
        let date = at(2020, 5, 1, 7, 8, 9);
        assert_eq!(search_date(date.date()), "01-May-2020");
        assert_eq!(internal_date(date), "01-May-2020 07:08:09 +0000");
        assert_eq!(stamp(date.date()), "20200501");
    }

    #[test]
    fn test_stamp_parse() {
        assert_eq!(
            parse_stamp("20200501\n"),
            NaiveDate::from_ymd_opt(2020, 5, 1)
        );
        assert_eq!(parse_stamp("2020-05-01"), None);
        assert_eq!(parse_stamp(""), None);
    }

    proptest! {
        #[test]
        fn prop_clamp_stays_in_range(
            year in any::<i64>(),
            month in any::<i64>(),
            day in any::<i64>(),
            hour in any::<i64>(),
            minute in any::<i64>(),
            second in any::<i64>(),
        ) {
            let date = clamp(RawDate { year, month, day, hour, minute, second });
            prop_assert!((1970..=10000).contains(&date.year()));
        }

        #[test]
        fn prop_sent_date_never_panics(value in "\\PC{0,64}") {
            let _ = sent_date(Some(&value));
        }
    }
}
