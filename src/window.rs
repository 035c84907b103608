use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One end of an allowed-hours window, as local wall-clock time
///
/// Accepted in configuration either as a bare hour (`20`) or as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "RawBound", into = "RawBound")]
pub struct WindowBound {
    hour: u8,
    minute: u8,
}

impl WindowBound {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// Whole-hour bound
    pub fn hour(hour: u32) -> Option<Self> {
        Self::new(hour, 0)
    }

    pub fn hours(&self) -> u32 {
        self.hour as u32
    }

    pub fn minutes(&self) -> u32 {
        self.minute as u32
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hours() * 60 + self.minutes()
    }

    /// 12-hour clock rendering, e.g. `8:00 PM`
    pub fn format_12h(&self) -> String {
        let suffix = if self.hour < 12 { "AM" } else { "PM" };
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour, self.minute, suffix)
    }
}

impl fmt::Display for WindowBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WindowBound {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (hour, minute) = match s.split_once(':') {
            Some((h, m)) => (h, m),
            None => (s, "0"),
        };

        let hour: u32 = hour
            .parse()
            .map_err(|_| format!("Invalid hour in time bound: {}", s))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| format!("Invalid minute in time bound: {}", s))?;

        Self::new(hour, minute).ok_or_else(|| format!("Time bound out of range: {}", s))
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum RawBound {
    Hour(u32),
    Clock(String),
}

impl TryFrom<RawBound> for WindowBound {
    type Error = String;

    fn try_from(raw: RawBound) -> Result<Self, Self::Error> {
        match raw {
            RawBound::Hour(hour) => {
                Self::hour(hour).ok_or_else(|| format!("Hour out of range (0-23): {}", hour))
            }
            RawBound::Clock(s) => s.parse(),
        }
    }
}

impl From<WindowBound> for RawBound {
    fn from(bound: WindowBound) -> Self {
        if bound.minute == 0 {
            RawBound::Hour(bound.hours())
        } else {
            RawBound::Clock(bound.to_string())
        }
    }
}

/// Recurring daily window `[start, end)` during which access is permitted
///
/// A window whose start is later than its end wraps past midnight
/// (e.g. 20:00-08:00). A window whose start equals its end spans the
/// whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedWindow {
    pub start: WindowBound,
    pub end: WindowBound,
}

impl AllowedWindow {
    pub fn new(start: WindowBound, end: WindowBound) -> Self {
        Self { start, end }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start.minutes_since_midnight() > self.end.minutes_since_midnight()
    }

    pub fn is_full_day(&self) -> bool {
        self.start == self.end
    }

    /// Whether a local wall-clock time falls inside the window
    pub fn contains(&self, time: NaiveTime) -> bool {
        let now = time.hour() * 60 + time.minute();
        let start = self.start.minutes_since_midnight();
        let end = self.end.minutes_since_midnight();

        if start < end {
            start <= now && now < end
        } else if start > end {
            now >= start || now < end
        } else {
            true
        }
    }

    /// Client-facing text describing when access is available
    pub fn availability_message(&self) -> String {
        format!(
            "available from {} to {}",
            self.start.format_12h(),
            self.end.format_12h()
        )
    }
}
