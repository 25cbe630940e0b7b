//! Weekly class timetables keyed by weekday.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::services::calendar::CalendarDecision;
use crate::types::{ClassId, TeacherId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(value: chrono::Weekday) -> Self {
        match value {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<chrono::Weekday>()
            .map(Into::into)
            .map_err(|_| format!("unknown weekday: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub period: i16,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<TeacherId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    pub class_id: ClassId,
    pub days: BTreeMap<Weekday, Vec<PeriodEntry>>,
}

impl Timetable {
    pub fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            days: BTreeMap::new(),
        }
    }

    /// Replaces a day's entries, keeping them ordered by period.
    pub fn set_day(&mut self, day: Weekday, mut entries: Vec<PeriodEntry>) {
        entries.sort_by_key(|entry| entry.period);
        self.days.insert(day, entries);
    }

    pub fn day(&self, day: Weekday) -> &[PeriodEntry] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Periods actually taught on `date`: none on holidays, the mapped
    /// weekday's schedule on a working Saturday.
    pub fn periods_on(&self, date: NaiveDate, decision: &CalendarDecision) -> &[PeriodEntry] {
        if decision.is_holiday {
            return &[];
        }
        let day = decision.mapped_day.unwrap_or_else(|| Weekday::of(date));
        self.day(day)
    }
}
