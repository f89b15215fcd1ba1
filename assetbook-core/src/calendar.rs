//! Calendar dates and reference months
//!
//! Design principles:
//! - Date-only values: a stored `YYYY-MM-DD` is a calendar day, never an
//!   instant, so no timezone can roll it into an adjacent day
//! - Date-time strings are truncated to their literal date part
//! - Month comparisons go through `YearMonth`, whose ordering matches
//!   comparing `"YYYY-MM"` strings
//! - Gregorian proleptic calendar

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Days in each month (non-leap year)
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

// ============================================================================
// CalendarError
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("Invalid month: {0} (must be 1-12)")]
    InvalidMonth(u32),

    #[error("Invalid day: {0} for {1}/{2}")]
    InvalidDay(u32, u32, i32), // day, month, year

    #[error("Year out of range: {0}")]
    InvalidYear(i32),

    #[error("Parse error: {0}")]
    ParseError(String),
}

// ============================================================================
// Calendar Utilities
// ============================================================================

/// Check if year is a leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Get days in a month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        m if (1..=12).contains(&m) => DAYS_IN_MONTH[(m - 1) as usize],
        _ => 0,
    }
}

fn parse_component<T: std::str::FromStr>(s: &str, what: &str, width: usize) -> Result<T, CalendarError> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CalendarError::ParseError(format!("Invalid {}: '{}'", what, s)));
    }
    s.parse()
        .map_err(|_| CalendarError::ParseError(format!("Invalid {}: '{}'", what, s)))
}

// ============================================================================
// CalendarDate
// ============================================================================

/// A calendar day with no time or timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

impl CalendarDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(CalendarError::InvalidYear(year));
        }
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(month));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(CalendarError::InvalidDay(day, month, year));
        }
        Ok(Self { year, month, day })
    }

    /// Parse an ISO 8601 date or date-time string
    ///
    /// Supported formats:
    /// - 2025-06-15
    /// - 2025-06-15T14:30:00
    /// - 2025-06-15T14:30:00.123Z
    /// - 2025-06-15T14:30:00-03:00
    /// - 2025-06-15 14:30:00
    ///
    /// Only the date part is read; the time and offset never move the day.
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        let s = s.trim();
        let date_part = match s.find(|c: char| c == 'T' || c == ' ') {
            Some(pos) => &s[..pos],
            None => s,
        };
        Self::parse_date_only(date_part)
    }

    fn parse_date_only(s: &str) -> Result<Self, CalendarError> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(CalendarError::ParseError(format!("Expected YYYY-MM-DD, got '{}'", s)));
        }

        let year: i32 = parse_component(parts[0], "year", 4)?;
        let month: u32 = parse_component(parts[1], "month", 2)?;
        let day: u32 = parse_component(parts[2], "day", 2)?;

        Self::from_ymd(year, month, day)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::of(*self)
    }

    pub fn to_iso_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso_string())
    }
}

impl std::str::FromStr for CalendarDate {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

// ============================================================================
// YearMonth
// ============================================================================

/// A reference month, stored as `year * 12 + (month - 1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    ordinal: i64,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(CalendarError::InvalidYear(year));
        }
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth(month));
        }
        Ok(Self { ordinal: year as i64 * 12 + (month as i64 - 1) })
    }

    /// Month containing the given day
    pub fn of(date: CalendarDate) -> Self {
        Self { ordinal: date.year as i64 * 12 + (date.month as i64 - 1) }
    }

    /// Parse `YYYY-MM`; a full date or date-time is truncated to its month
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        let s = s.trim();
        if s.len() == 7 {
            let parts: Vec<&str> = s.split('-').collect();
            if parts.len() != 2 {
                return Err(CalendarError::ParseError(format!("Expected YYYY-MM, got '{}'", s)));
            }
            let year: i32 = parse_component(parts[0], "year", 4)?;
            let month: u32 = parse_component(parts[1], "month", 2)?;
            return Self::new(year, month);
        }
        CalendarDate::parse(s).map(Self::of)
    }

    /// Current calendar month from the system clock (UTC)
    pub fn current() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let (year, month, _) = civil_from_days(secs.div_euclid(86_400));
        Self { ordinal: year as i64 * 12 + (month as i64 - 1) }
    }

    pub fn year(&self) -> i32 {
        self.ordinal.div_euclid(12) as i32
    }

    pub fn month(&self) -> u32 {
        (self.ordinal.rem_euclid(12) + 1) as u32
    }

    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    /// `None` when the result leaves the representable range
    pub fn checked_add_months(&self, months: i64) -> Option<Self> {
        self.ordinal.checked_add(months).map(|ordinal| Self { ordinal })
    }

    /// Saturates at the ends of the representable range
    pub fn add_months(&self, months: i64) -> Self {
        Self { ordinal: self.ordinal.saturating_add(months) }
    }

    /// Signed number of months from `self` to `later`
    pub fn months_until(&self, later: &YearMonth) -> i64 {
        later.ordinal.saturating_sub(self.ordinal)
    }

    pub fn first_day(&self) -> CalendarDate {
        CalendarDate { year: self.year(), month: self.month(), day: 1 }
    }

    pub fn last_day(&self) -> CalendarDate {
        let (year, month) = (self.year(), self.month());
        CalendarDate { year, month, day: days_in_month(year, month) }
    }
}

/// Months from `start` to `end`, negative when `end` is earlier
pub fn months_between(start: &YearMonth, end: &YearMonth) -> i64 {
    start.months_until(end)
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl std::str::FromStr for YearMonth {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct YearMonthVisitor;

impl<'de> Visitor<'de> for YearMonthVisitor {
    type Value = YearMonth;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YYYY-MM string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<YearMonth, E> {
        YearMonth::parse(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(YearMonthVisitor)
    }
}

/// Convert days since Unix epoch to civil date
/// Algorithm from Howard Hinnant: http://howardhinnant.github.io/date_algorithms.html
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365; // [0, 399]
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = if mp < 10 { mp + 3 } else { mp - 9 }; // [1, 12]
    let year = if m <= 2 { y + 1 } else { y };
    (year as i32, m, d)
}
