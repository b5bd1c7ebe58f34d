//! `Date` header parsing.
//!
//! Mail clients disagree on the header layout, so several formats are tried
//! in a fixed order and the first that parses wins.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Utc};
use regex::Regex;

use super::error::{MailError, Result};

static RE_TRAILING_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());
static RE_ZONE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:GMT|UT|UTC)$").unwrap());
static RE_WEEKDAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\s*,?\s*").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// The layout that matched a header, in the order they are tried.
///
/// A leading weekday is removed before matching and never checked against the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDateFormat {
    /// `02 Jan 2006 15:04:05 -0700`
    FullYear,
    /// `02 Jan 06 15:04:05 -0700`
    ShortYear,
    /// `02 Jan 2006 15:04:05`, taken as UTC
    FullYearNoOffset,
    /// `02 Jan 06 15:04:05`, taken as UTC
    ShortYearNoOffset,
}

impl HeaderDateFormat {
    pub const ALL: [HeaderDateFormat; 4] = [
        HeaderDateFormat::FullYear,
        HeaderDateFormat::ShortYear,
        HeaderDateFormat::FullYearNoOffset,
        HeaderDateFormat::ShortYearNoOffset,
    ];

    fn pattern(self) -> &'static str {
        match self {
            HeaderDateFormat::FullYear => "%d %b %Y %H:%M:%S %z",
            HeaderDateFormat::ShortYear => "%d %b %y %H:%M:%S %z",
            HeaderDateFormat::FullYearNoOffset => "%d %b %Y %H:%M:%S",
            HeaderDateFormat::ShortYearNoOffset => "%d %b %y %H:%M:%S",
        }
    }

    fn four_digit_year(self) -> bool {
        matches!(
            self,
            HeaderDateFormat::FullYear | HeaderDateFormat::FullYearNoOffset
        )
    }

    fn has_offset(self) -> bool {
        matches!(self, HeaderDateFormat::FullYear | HeaderDateFormat::ShortYear)
    }

    fn parse(self, value: &str) -> Option<DateTime<Utc>> {
        let parsed = if self.has_offset() {
            DateTime::<FixedOffset>::parse_from_str(value, self.pattern())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        } else {
            NaiveDateTime::parse_from_str(value, self.pattern())
                .ok()
                .map(|naive| naive.and_utc())
        }?;

        // `%Y` happily reads "06" as year 6.
        if self.four_digit_year() && parsed.year() < 1000 {
            return None;
        }
        Some(parsed)
    }
}

/// Normalizes a raw header: collapses whitespace, drops a leading weekday
/// and a trailing `(comment)`, and turns a trailing `GMT`/`UT`/`UTC` into `+0000`.
fn preprocess(raw: &str) -> String {
    let collapsed = RE_WHITESPACE.replace_all(raw.trim(), " ");
    let without_weekday = RE_WEEKDAY.replace(&collapsed, "");
    let without_comment = RE_TRAILING_COMMENT.replace(&without_weekday, "");
    RE_ZONE_NAME
        .replace(without_comment.trim(), " +0000")
        .into_owned()
}

/// Parses a `Date` header, returning the instant and the layout that matched.
pub fn parse_header_date(raw: &str) -> Result<(DateTime<Utc>, HeaderDateFormat)> {
    let value = preprocess(raw);
    HeaderDateFormat::ALL
        .iter()
        .find_map(|format| format.parse(&value).map(|dt| (dt, *format)))
        .ok_or_else(|| MailError::DateParse(raw.to_string()))
}

/// Converts Gmail's `internalDate` (epoch milliseconds as a string).
pub fn parse_internal_date(raw: &str) -> Result<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| MailError::DateParse(format!("internalDate {}", raw)))
}
