//! Calendar month and date helpers
//!
//! Budgets are keyed by `"YYYY-MM"` strings and expenses by `"YYYY-MM-DD"`
//! strings. Keeping them as strings on the documents lets lexicographic range
//! queries double as date range queries.

use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::error::TallyError;

/// A calendar month (e.g., "2025-01")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, returning `None` for an out-of-range month number
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// The current calendar month in local time
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// The month a date falls in
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a strict `YYYY-MM` string.
    ///
    /// Only the canonical form is accepted: the parsed month must print back
    /// as exactly `s`.
    pub fn parse(s: &str) -> Option<Self> {
        if !has_shape(s, "dddd-dd") {
            return None;
        }
        let month = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .ok()
            .map(Self::containing)?;
        (month.to_string() == s).then_some(month)
    }

    /// The month of a `YYYY-MM-DD` date string
    pub fn of_date(date: &str) -> Option<Self> {
        parse_date(date).map(Self::containing)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Lower bound of the expense date range for this month
    pub fn first_day_key(&self) -> String {
        format!("{}-01", self)
    }

    /// Upper bound of the expense date range for this month.
    ///
    /// Always day 31: the bound only has to sort after every real date of
    /// the month.
    pub fn last_day_key(&self) -> String {
        format!("{}-31", self)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| TallyError::Validation(format!("Invalid month '{}', expected YYYY-MM", s)))
    }
}

/// Parse a strict `YYYY-MM-DD` string; the date must print back as `s`
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if !has_shape(s, "dddd-dd-dd") {
        return None;
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    (date.format("%Y-%m-%d").to_string() == s).then_some(date)
}

/// Whether `s` matches `shape`, where `d` stands for an ASCII digit
fn has_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes().zip(shape.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            _ => c == p,
        })
}

/// Today's date as `YYYY-MM-DD` in local time
pub fn today_string() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// The current local time as `YYYY-MM-DD HH:MM:SS`
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
