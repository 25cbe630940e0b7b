use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::timetable::Weekday;
use crate::types::HolidayRuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayRuleKind {
    Special,
    SaturdayWorking,
}

impl HolidayRuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayRuleKind::Special => "SPECIAL",
            HolidayRuleKind::SaturdayWorking => "SATURDAY_WORKING",
        }
    }
}

impl FromStr for HolidayRuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SPECIAL" => Ok(HolidayRuleKind::Special),
            "SATURDAY_WORKING" => Ok(HolidayRuleKind::SaturdayWorking),
            other => Err(format!("unknown holiday rule type: {}", other)),
        }
    }
}

/// A declared calendar exception over an inclusive day range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayRule {
    pub id: HolidayRuleId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: HolidayRuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_day: Option<Weekday>,
}

impl HolidayRule {
    pub fn special(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: HolidayRuleId::new(),
            name: name.into(),
            start_date,
            end_date,
            kind: HolidayRuleKind::Special,
            mapped_day: None,
        }
    }

    pub fn saturday_working(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        mapped_day: Option<Weekday>,
    ) -> Self {
        Self {
            id: HolidayRuleId::new(),
            name: name.into(),
            start_date,
            end_date,
            kind: HolidayRuleKind::SaturdayWorking,
            mapped_day,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlaps(&self, window_start: NaiveDate, window_end_inclusive: NaiveDate) -> bool {
        self.start_date <= window_end_inclusive && self.end_date >= window_start
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct HolidayRuleRow {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rule_type: String,
    pub mapped_day: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<HolidayRuleRow> for HolidayRule {
    type Error = AppError;

    fn try_from(row: HolidayRuleRow) -> Result<Self, Self::Error> {
        let kind = row
            .rule_type
            .parse()
            .map_err(|e: String| AppError::InternalServerError(anyhow::anyhow!(e)))?;
        let mapped_day = row
            .mapped_day
            .as_deref()
            .map(str::parse::<Weekday>)
            .transpose()
            .map_err(|e| AppError::InternalServerError(anyhow::anyhow!(e)))?;
        Ok(HolidayRule {
            id: row.id.into(),
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            kind,
            mapped_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn covers_is_inclusive_on_both_ends() {
        let rule = HolidayRule::special("Autumn break", date(2025, 10, 6), date(2025, 10, 10));
        assert!(rule.covers(date(2025, 10, 6)));
        assert!(rule.covers(date(2025, 10, 10)));
        assert!(!rule.covers(date(2025, 10, 11)));
        assert!(!rule.covers(date(2025, 10, 5)));
    }

    #[test]
    fn overlaps_detects_partial_windows() {
        let rule = HolidayRule::special("Break", date(2025, 3, 28), date(2025, 4, 2));
        assert!(rule.overlaps(date(2025, 4, 1), date(2025, 4, 30)));
        assert!(!rule.overlaps(date(2025, 4, 3), date(2025, 4, 30)));
    }

    #[test]
    fn rule_kind_round_trips_text() {
        assert_eq!(
            "saturday_working".parse::<HolidayRuleKind>().unwrap(),
            HolidayRuleKind::SaturdayWorking
        );
        assert_eq!(HolidayRuleKind::Special.as_str(), "SPECIAL");
        assert!("WEEKLY".parse::<HolidayRuleKind>().is_err());
    }
}
