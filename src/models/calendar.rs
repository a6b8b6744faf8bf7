//! Calendar and time window models.
//!
//! Defines the weekly calendar the timetable is built on: scheduling weeks
//! identified by their Monday, working days (Monday to Saturday), and
//! wall-clock time windows within a day.
//!
//! # Time Model
//! Times are local wall-clock times ([`NaiveTime`]); dates are calendar
//! dates ([`NaiveDate`]). A window never spans midnight.
//!
//! # Intervals
//! All windows are half-open: `[start, end)`. Two sessions where one ends
//! at 10:00 and the next starts at 10:00 do not overlap.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A working day of the week.
///
/// Sunday is not a working day and has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    /// All working days, Monday first.
    pub const ALL: [DayOfWeek; 6] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// Full English day name.
    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }

    /// Days after Monday (Monday = 0).
    pub fn offset(self) -> u64 {
        match self {
            DayOfWeek::Monday => 0,
            DayOfWeek::Tuesday => 1,
            DayOfWeek::Wednesday => 2,
            DayOfWeek::Thursday => 3,
            DayOfWeek::Friday => 4,
            DayOfWeek::Saturday => 5,
        }
    }

    /// Maps a chrono weekday; `None` for Sunday.
    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        match weekday {
            Weekday::Mon => Some(DayOfWeek::Monday),
            Weekday::Tue => Some(DayOfWeek::Tuesday),
            Weekday::Wed => Some(DayOfWeek::Wednesday),
            Weekday::Thu => Some(DayOfWeek::Thursday),
            Weekday::Fri => Some(DayOfWeek::Friday),
            Weekday::Sat => Some(DayOfWeek::Saturday),
            Weekday::Sun => None,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string is not a working-day name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized day '{0}'")]
pub struct UnknownDay(pub String);

impl FromStr for DayOfWeek {
    type Err = UnknownDay;

    /// Parses a full day name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        DayOfWeek::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownDay(s.to_string()))
    }
}

/// Error returned when a week start is not a Monday.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{date} is a {weekday}, weeks must start on Monday")]
pub struct NotMonday {
    pub date: NaiveDate,
    pub weekday: Weekday,
}

/// The Monday identifying one scheduling week.
///
/// Construction guarantees `weekday() == Monday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct WeekStart(NaiveDate);

impl WeekStart {
    /// Validates that `date` is a Monday.
    pub fn new(date: NaiveDate) -> Result<Self, NotMonday> {
        if date.weekday() == Weekday::Mon {
            Ok(Self(date))
        } else {
            Err(NotMonday {
                date,
                weekday: date.weekday(),
            })
        }
    }

    /// The week containing `date` (Sunday belongs to the week before it).
    pub fn containing(date: NaiveDate) -> Self {
        let back = u64::from(date.weekday().num_days_from_monday());
        Self(date - Days::new(back))
    }

    /// The Monday itself.
    #[inline]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Calendar date of `day` within this week.
    pub fn date_for(self, day: DayOfWeek) -> NaiveDate {
        self.0 + Days::new(day.offset())
    }

    /// The week before this one.
    pub fn previous(self) -> Self {
        Self(self.0 - Days::new(7))
    }

    /// Whether `date` falls within Monday..=Sunday of this week.
    pub fn contains(self, date: NaiveDate) -> bool {
        Self::containing(date) == self
    }
}

impl TryFrom<NaiveDate> for WeekStart {
    type Error = NotMonday;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        Self::new(date)
    }
}

impl From<WeekStart> for NaiveDate {
    fn from(week: WeekStart) -> Self {
        week.0
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Interval start (inclusive).
    pub start: NaiveTime,
    /// Interval end (exclusive).
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Duration of this window. Negative when `end < start`.
    #[inline]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Duration in whole minutes.
    #[inline]
    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Whether the window is non-empty.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Whether `other` lies entirely within this window.
    pub fn covers(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The common part of two windows, `[max(starts), min(ends))`.
    ///
    /// Returns `None` when the windows only touch or are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Self { start, end })
    }

    /// Display key used by timetable grids, e.g. `09:00-10:00`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A time window on a specific working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeeklyWindow {
    pub day: DayOfWeek,
    pub window: TimeWindow,
}

impl WeeklyWindow {
    pub fn new(day: DayOfWeek, window: TimeWindow) -> Self {
        Self { day, window }
    }
}

/// An availability record as stored for a child or therapist.
///
/// The day is kept as entered so that unrecognized values can be reported
/// by validation instead of being rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// Day name, e.g. `"Monday"`.
    pub day_of_week: String,
    /// Window start.
    pub start_time: NaiveTime,
    /// Window end.
    pub end_time: NaiveTime,
}

impl AvailabilityWindow {
    /// Creates a record for a recognized day.
    pub fn new(day: DayOfWeek, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            day_of_week: day.name().to_string(),
            start_time,
            end_time,
        }
    }

    /// Creates a record from a raw day string.
    pub fn raw(day_of_week: impl Into<String>, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            day_of_week: day_of_week.into(),
            start_time,
            end_time,
        }
    }

    /// Parsed day, `None` if unrecognized.
    pub fn day(&self) -> Option<DayOfWeek> {
        self.day_of_week.parse().ok()
    }

    /// The time range of this record.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// Day and window, `None` if the day is unrecognized.
    pub fn weekly(&self) -> Option<WeeklyWindow> {
        self.day().map(|day| WeeklyWindow::new(day, self.window()))
    }
}
