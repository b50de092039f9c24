// Core data structures for the slotbot booking pipeline

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Day of the week as the vendor listing groups it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    #[serde(alias = "Monday", alias = "mon")]
    Mon,
    #[serde(alias = "Tuesday", alias = "tue")]
    Tue,
    #[serde(alias = "Wednesday", alias = "wed")]
    Wed,
    #[serde(alias = "Thursday", alias = "thu")]
    Thu,
    #[serde(alias = "Friday", alias = "fri")]
    Fri,
    #[serde(alias = "Saturday", alias = "sat")]
    Sat,
    #[serde(alias = "Sunday", alias = "sun")]
    Sun,
}

impl DayOfWeek {
    /// Short name used in configuration and logs ("Mon")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }

    /// Full English name used in reports ("Monday")
    pub fn full_name(&self) -> &'static str {
        match self {
            Self::Mon => "Monday",
            Self::Tue => "Tuesday",
            Self::Wed => "Wednesday",
            Self::Thu => "Thursday",
            Self::Fri => "Friday",
            Self::Sat => "Saturday",
            Self::Sun => "Sunday",
        }
    }

    /// Day of the week a calendar date falls on
    pub fn of_date(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    /// Create from string (short or full name, case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mon" | "monday" => Some(Self::Mon),
            "tue" | "tues" | "tuesday" => Some(Self::Tue),
            "wed" | "wednesday" => Some(Self::Wed),
            "thu" | "thur" | "thurs" | "thursday" => Some(Self::Thu),
            "fri" | "friday" => Some(Self::Fri),
            "sat" | "saturday" => Some(Self::Sat),
            "sun" | "sunday" => Some(Self::Sun),
            _ => None,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start time of a class, minute resolution
///
/// Rendered and configured as 24-hour `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Create from hour and minute
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Truncate a clock time to minute resolution
    pub fn from_time(time: NaiveTime) -> Self {
        use chrono::Timelike;
        Self(NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time))
    }

    pub fn as_time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|e| format!("invalid time of day {s:?} (expected HH:MM): {e}"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Identity of a desired slot: (day-of-week, time-of-day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub day: DayOfWeek,
    pub time: TimeOfDay,
}

impl SlotKey {
    pub fn new(day: DayOfWeek, time: TimeOfDay) -> Self {
        Self { day, time }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.time)
    }
}

/// How the listing advertises one class occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotClassification {
    /// Bookable, carries a reservation URL
    Open,
    /// Full but accepting waitlist joins, carries a waitlist URL
    Waitlistable,
    /// Already reserved under this account
    AlreadyBooked,
    /// Full with no waitlist
    Full,
    /// This account is already on the waitlist
    AlreadyWaitlisted,
}

impl SlotClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Waitlistable => "waitlistable",
            Self::AlreadyBooked => "already_booked",
            Self::Full => "full",
            Self::AlreadyWaitlisted => "already_waitlisted",
        }
    }
}

impl fmt::Display for SlotClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One advertised class occurrence found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day: DayOfWeek,
    pub time: TimeOfDay,
    pub date: NaiveDate,
    pub classification: SlotClassification,
    /// Reservation URL for `Open`, waitlist-join URL for `Waitlistable`
    pub action_url: Option<String>,
}

impl ScheduleSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.day, self.time)
    }
}

/// Availability found on one listing page, keyed by day then time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    days: BTreeMap<DayOfWeek, BTreeMap<TimeOfDay, ScheduleSlot>>,
}

impl PageResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot, returning the entry it replaced on the same key
    pub fn insert(&mut self, slot: ScheduleSlot) -> Option<ScheduleSlot> {
        self.days.entry(slot.day).or_default().insert(slot.time, slot)
    }

    pub fn get(&self, key: &SlotKey) -> Option<&ScheduleSlot> {
        self.days.get(&key.day).and_then(|times| times.get(&key.time))
    }

    /// Slots listed for one day of the week
    pub fn day(&self, day: DayOfWeek) -> Option<&BTreeMap<TimeOfDay, ScheduleSlot>> {
        self.days.get(&day)
    }

    pub fn slots(&self) -> impl Iterator<Item = &ScheduleSlot> {
        self.days.values().flat_map(|times| times.values())
    }

    pub fn len(&self) -> usize {
        self.days.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of parsing one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPage {
    /// The explicit "no classes scheduled" marker: pagination is exhausted
    NoClasses,
    /// The page listed classes
    Schedule(PageResult),
}

impl ParsedPage {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::NoClasses)
    }
}

/// State of a desired slot over one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Pending,
    Booked,
    Waitlisted,
    Full,
    Failed,
}

impl SlotState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Booked => "booked",
            Self::Waitlisted => "waitlisted",
            Self::Full => "full",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A range of the published schedule crawled as one independent stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// Name used in logs ("this-week", "next-week")
    pub label: String,
    /// First day of the window; `None` leaves the site default (today)
    pub start: Option<NaiveDate>,
}

impl DateWindow {
    /// The listing as the site shows it by default
    pub fn current() -> Self {
        Self {
            label: "current".to_string(),
            start: None,
        }
    }

    pub fn starting(label: impl Into<String>, start: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start: Some(start),
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(start) => write!(f, "{} ({start})", self.label),
            None => f.write_str(&self.label),
        }
    }
}
