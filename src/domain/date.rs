//! Calendar date parsing for the formats used at the input boundary.
//!
//! The core only ever sees [`NaiveDate`] values, which are valid by
//! construction. Everything textual is turned into a date here, or rejected.

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The earliest year accepted from user input.
pub const MIN_YEAR: i32 = 1900;
/// The latest year accepted from user input.
pub const MAX_YEAR: i32 = 2999;

static ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"));
static DAY_MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s+(\d{1,2})\s+(\d{4})$").expect("valid regex"));

/// The textual layout of a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    #[default]
    Iso,
    /// `DD MM YYYY`
    Dmy,
}

impl DateFormat {
    /// Renders `date` in this format.
    #[must_use]
    pub fn format(self, date: NaiveDate) -> String {
        match self {
            Self::Iso => date.format("%Y-%m-%d").to_string(),
            Self::Dmy => date.format("%d %m %Y").to_string(),
        }
    }

    /// A human readable pattern, for prompts and error messages.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Iso => "YYYY-MM-DD",
            Self::Dmy => "DD MM YYYY",
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iso => f.write_str("iso"),
            Self::Dmy => f.write_str("dmy"),
        }
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso" => Ok(Self::Iso),
            "dmy" => Ok(Self::Dmy),
            other => Err(format!("unknown date format '{other}', expected 'iso' or 'dmy'")),
        }
    }
}

/// Error returned when text is not a plausible calendar date.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid date '{input}': expected {pattern} between years 1900 and 2999")]
pub struct InvalidDateError {
    pub(crate) input: String,
    pub(crate) pattern: &'static str,
}

impl InvalidDateError {
    /// The rejected input.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Parses `text` as a calendar date laid out in `format`.
///
/// Impossible dates such as `2023-02-29` and years outside
/// [`MIN_YEAR`]..=[`MAX_YEAR`] are rejected.
///
/// # Errors
///
/// Returns [`InvalidDateError`] if `text` does not match the layout or does
/// not name a real day.
pub fn parse_date(text: &str, format: DateFormat) -> Result<NaiveDate, InvalidDateError> {
    let invalid = || InvalidDateError {
        input: text.to_string(),
        pattern: format.pattern(),
    };
    let trimmed = text.trim();

    let caps = match format {
        DateFormat::Iso => ISO.captures(trimmed),
        DateFormat::Dmy => DAY_MONTH_YEAR.captures(trimmed),
    }
    .ok_or_else(invalid)?;

    let (year, month, day) = match format {
        DateFormat::Iso => (&caps[1], &caps[2], &caps[3]),
        DateFormat::Dmy => (&caps[3], &caps[2], &caps[1]),
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(invalid());
    }
    Ok(date)
}
