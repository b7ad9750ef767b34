//! Wall-clock send times and date validation.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ApodError, Result};

/// Earliest date the APOD archive serves (exclusive lower bound for date lookups).
pub const EARLIEST_APOD_DATE: (i32, u32, u32) = (1995, 6, 16);

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}$").expect("static regex"))
}

/// `H:MM` or `HH:MM` with hour 0-23 and minute 0-59.
pub fn is_valid_time_format(input: &str) -> bool {
    SendTime::parse(input).is_ok()
}

/// `YYYY-MM-DD`, a real calendar date, strictly after 1995-06-16.
pub fn is_valid_date_format(input: &str) -> bool {
    parse_apod_date(input).is_ok()
}

/// Parse a date argument for an archive lookup.
pub fn parse_apod_date(input: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| ApodError::InvalidDateFormat(format!("'{input}' is not YYYY-MM-DD")))?;
    let (y, m, d) = EARLIEST_APOD_DATE;
    let earliest = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| ApodError::InvalidDateFormat("bad archive start date".into()))?;
    if date <= earliest {
        return Err(ApodError::InvalidDateFormat(format!(
            "'{input}' must be after {earliest}"
        )));
    }
    Ok(date)
}

/// Daily send time in the host's local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SendTime {
    hour: u32,
    minute: u32,
}

impl SendTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(ApodError::InvalidTimeFormat(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// Parse `H:MM` / `HH:MM`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !time_pattern().is_match(input) {
            return Err(ApodError::InvalidTimeFormat(format!(
                "'{input}' is not HH:MM"
            )));
        }
        let (h, m) = input
            .split_once(':')
            .ok_or_else(|| ApodError::InvalidTimeFormat(input.to_string()))?;
        let hour: u32 = h
            .parse()
            .map_err(|_| ApodError::InvalidTimeFormat(input.to_string()))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| ApodError::InvalidTimeFormat(input.to_string()))?;
        Self::new(hour, minute)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl fmt::Display for SendTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for SendTime {
    type Err = ApodError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SendTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SendTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
