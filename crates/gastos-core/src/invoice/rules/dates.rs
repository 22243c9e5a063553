//! Date parsing and sanitization for model output.
//!
//! The model is prompted to return `DD/MM/YYYY`, but answers arrive in any of
//! four shapes. A date is only trusted when it lies strictly before the day the
//! record is validated and not before a minimum year: OCR noise and models
//! falling back to "today" are the common failure modes.

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use super::FieldExtractor;
use super::patterns::{DATE_DMY_DASH, DATE_DMY_SHORT, DATE_DMY_SLASH, DATE_FRAGMENT, DATE_YMD_DASH};

/// Accepted wire formats, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `DD/MM/YYYY`
    DayMonthYear,
    /// `YYYY-MM-DD`
    Iso,
    /// `DD-MM-YYYY`
    DayMonthYearDash,
    /// `DD/MM/YY`
    DayMonthShortYear,
}

impl DateFormat {
    pub const ALL: [DateFormat; 4] = [
        DateFormat::DayMonthYear,
        DateFormat::Iso,
        DateFormat::DayMonthYearDash,
        DateFormat::DayMonthShortYear,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            DateFormat::DayMonthYear => &DATE_DMY_SLASH,
            DateFormat::Iso => &DATE_YMD_DASH,
            DateFormat::DayMonthYearDash => &DATE_DMY_DASH,
            DateFormat::DayMonthShortYear => &DATE_DMY_SHORT,
        }
    }

    /// Parse `text` as exactly this format.
    pub fn parse(self, text: &str) -> Option<NaiveDate> {
        let caps = self.pattern().captures(text)?;
        let (year, month, day) = match self {
            DateFormat::Iso => (&caps[1], &caps[2], &caps[3]),
            _ => (&caps[3], &caps[2], &caps[1]),
        };

        let year: i32 = year.parse().ok()?;
        let year = match self {
            DateFormat::DayMonthShortYear => expand_short_year(year),
            _ => year,
        };

        NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
    }
}

/// POSIX pivot: 69-99 are 1900s, 00-68 are 2000s.
fn expand_short_year(year: i32) -> i32 {
    if year >= 69 { 1900 + year } else { 2000 + year }
}

/// Parse a whole string against the four formats; first success wins.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DateFormat::ALL.iter().find_map(|format| format.parse(text))
}

/// Range a trustworthy issue date must fall into.
#[derive(Debug, Clone, Copy)]
pub struct DateWindow {
    /// Day of validation; this day and later are rejected.
    pub today: NaiveDate,
    /// Earliest accepted year.
    pub min_year: i32,
}

impl DateWindow {
    pub fn new(today: NaiveDate, min_year: i32) -> Self {
        Self { today, min_year }
    }

    /// True when `date` is today or later.
    pub fn is_not_past(&self, date: NaiveDate) -> bool {
        date >= self.today
    }

    /// Strictly before today, and within `[min_year, current year]`.
    pub fn accepts(&self, date: NaiveDate) -> bool {
        date != self.today
            && date.year() >= self.min_year
            && date.year() <= self.today.year()
            && date <= self.today
    }
}

/// Finds date-shaped fragments inside free text.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = NaiveDate;

    /// Parse the first date-shaped fragment only.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        DATE_FRAGMENT
            .find(text)
            .and_then(|m| parse_date(m.as_str()))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        DATE_FRAGMENT
            .find_iter(text)
            .filter_map(|m| parse_date(m.as_str()))
            .collect()
    }
}

/// Read a contract date (`fecha`) back into a calendar date.
///
/// Returns `None` for empty text, unknown shapes, dates on or after today and
/// dates before `min_year`.
pub fn parse_wire_date(text: &str, min_year: i32) -> Option<NaiveDate> {
    parse_wire_date_on(text, &DateWindow::new(Local::now().date_naive(), min_year))
}

/// [`parse_wire_date`] against an explicit window.
pub fn parse_wire_date_on(text: &str, window: &DateWindow) -> Option<NaiveDate> {
    parse_date(text).filter(|date| window.accepts(*date))
}
