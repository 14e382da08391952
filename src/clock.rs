use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockSnapshot {
    pub time: String,
    pub date: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ClockSnapshot {
    pub fn now() -> Self {
        Self::at(&Local::now())
    }

    pub fn at<Tz>(moment: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            time: moment.format("%H:%M:%S").to_string(),
            date: moment.format("%A, %B %-d, %Y").to_string(),
            timestamp: moment.timestamp_millis(),
        }
    }
}
