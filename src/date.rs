//! Entry date parsing and formatting.
//!
//! Dates appear in two places: `[izu:date:...]` header tags inside markup,
//! and the leading date of entry file/directory names. Both are hand-authored,
//! so parsing is deliberately flexible: `-` or `/` separators, an optional
//! time-of-day, and the compact `YYYYMMDD` form used in filenames.
//!
//! No calendar math happens here. A date is an ordering key and a formatting
//! source (page headers, month indexes, the Atom feed), nothing more.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! regex {
    ($pattern:expr) => {{
        use std::sync::OnceLock;
        static REGEX: OnceLock<regex::Regex> = OnceLock::new();
        REGEX.get_or_init(|| regex::Regex::new($pattern).unwrap_or_else(|e| panic!("{}", e)))
    }};
}

pub(crate) use regex;

/// A calendar date with an optional time of day, second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl EntryDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    pub fn with_time(mut self, hour: u32, minute: u32, second: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    /// Parse a hand-authored date value.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and the compact `YYYYMMDD`, each
    /// with an optional ` HH:MM[:SS]` suffix. Returns `None` for anything
    /// else or for out-of-range components.
    pub fn parse(value: &str) -> Option<Self> {
        let re = regex!(
            r"^(\d{4})(?:[-/](\d{1,2})[-/](\d{1,2})|(\d{2})(\d{2}))(?:[ T](\d{1,2}):(\d{2})(?::(\d{2}))?)?$"
        );
        let caps = re.captures(value.trim())?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let year: i32 = caps.get(1)?.as_str().parse().ok()?;
        let (month, day) = if caps.get(2).is_some() {
            (field(2)?, field(3)?)
        } else {
            (field(4)?, field(5)?)
        };
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        let mut date = Self::new(year, month, day);
        if let Some(hour) = field(6) {
            let minute = field(7)?;
            let second = field(8).unwrap_or(0);
            if hour > 23 || minute > 59 || second > 59 {
                return None;
            }
            date = date.with_time(hour, minute, second);
        }
        Some(date)
    }

    /// `YYYY-MM` key used for the month index pages.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// RFC-3339 timestamp for the Atom feed. Entry dates carry no zone
    /// information, so they are published as UTC.
    pub fn rfc3339(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    fn has_time(&self) -> bool {
        self.hour != 0 || self.minute != 0 || self.second != 0
    }
}

impl fmt::Display for EntryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        if self.has_time() {
            write!(f, " {:02}:{:02}:{:02}", self.hour, self.minute, self.second)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dashed_date() {
        assert_eq!(EntryDate::parse("2006-05-28"), Some(EntryDate::new(2006, 5, 28)));
    }

    #[test]
    fn parses_slashed_date() {
        assert_eq!(EntryDate::parse("2006/5/8"), Some(EntryDate::new(2006, 5, 8)));
    }

    #[test]
    fn parses_compact_date() {
        assert_eq!(EntryDate::parse("20060528"), Some(EntryDate::new(2006, 5, 28)));
    }

    #[test]
    fn parses_date_with_time() {
        assert_eq!(
            EntryDate::parse("2006-05-28 17:10:23"),
            Some(EntryDate::new(2006, 5, 28).with_time(17, 10, 23))
        );
    }

    #[test]
    fn parses_time_without_seconds() {
        assert_eq!(
            EntryDate::parse("2006-05-28 17:10"),
            Some(EntryDate::new(2006, 5, 28).with_time(17, 10, 0))
        );
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(EntryDate::parse("  2006-05-28 "), Some(EntryDate::new(2006, 5, 28)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(EntryDate::parse("yesterday"), None);
        assert_eq!(EntryDate::parse("2006-13-01"), None);
        assert_eq!(EntryDate::parse("2006-00-10"), None);
        assert_eq!(EntryDate::parse("2006-05-28 25:00"), None);
        assert_eq!(EntryDate::parse(""), None);
    }

    #[test]
    fn ordering_is_chronological() {
        let a = EntryDate::new(2006, 5, 28);
        let b = EntryDate::new(2006, 5, 28).with_time(9, 0, 0);
        let c = EntryDate::new(2006, 6, 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn display_omits_midnight() {
        assert_eq!(EntryDate::new(2006, 5, 28).to_string(), "2006-05-28");
        assert_eq!(
            EntryDate::new(2006, 5, 28).with_time(17, 10, 23).to_string(),
            "2006-05-28 17:10:23"
        );
    }

    #[test]
    fn rfc3339_timestamp() {
        assert_eq!(
            EntryDate::new(2006, 5, 28).with_time(17, 10, 23).rfc3339(),
            "2006-05-28T17:10:23Z"
        );
    }

    #[test]
    fn month_key_format() {
        assert_eq!(EntryDate::new(2006, 5, 28).month_key(), "2006-05");
    }
}
