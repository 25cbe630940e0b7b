//! Holiday and working-day resolution from declared calendar rules.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::holiday::{HolidayRule, HolidayRuleKind};
use crate::models::timetable::Weekday;
use crate::repositories::HolidayRuleRepositoryTrait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarReason {
    Sunday,
    /// A SPECIAL rule covers the date; carries the rule name.
    Special(String),
    SaturdayWorking,
    Saturday,
    WorkingDay,
}

impl CalendarReason {
    pub fn label(&self) -> &str {
        match self {
            CalendarReason::Sunday => "Sunday",
            CalendarReason::Special(name) => name.as_str(),
            CalendarReason::SaturdayWorking => "Saturday working day",
            CalendarReason::Saturday => "Saturday",
            CalendarReason::WorkingDay => "working day",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDecision {
    pub is_holiday: bool,
    pub is_working_day: bool,
    pub reason: CalendarReason,
    /// Weekday whose timetable a working Saturday follows.
    pub mapped_day: Option<Weekday>,
}

impl CalendarDecision {
    fn holiday(reason: CalendarReason) -> Self {
        Self {
            is_holiday: true,
            is_working_day: false,
            reason,
            mapped_day: None,
        }
    }

    fn working(reason: CalendarReason, mapped_day: Option<Weekday>) -> Self {
        Self {
            is_holiday: false,
            is_working_day: true,
            reason,
            mapped_day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub date: NaiveDate,
    pub decision: CalendarDecision,
}

#[derive(Clone)]
pub struct CalendarResolver {
    rules: Arc<dyn HolidayRuleRepositoryTrait>,
}

impl CalendarResolver {
    pub fn new(rules: Arc<dyn HolidayRuleRepositoryTrait>) -> Self {
        Self { rules }
    }

    pub async fn resolve(&self, date: NaiveDate) -> Result<CalendarDecision, AppError> {
        if Weekday::of(date) == Weekday::Sunday {
            return Ok(CalendarDecision::holiday(CalendarReason::Sunday));
        }
        let rules = self.rules.find_overlapping(date, date).await?;
        Ok(decide(date, &rules))
    }

    /// Holidays of one month, resolved from a single range query.
    pub async fn list_month(&self, year: i32, month: u32) -> Result<Vec<CalendarEntry>, AppError> {
        let (window_start, window_end) = month_bounds(year, month)?;
        ensure_valid_window(window_start, window_end)?;
        let last_inclusive = window_end
            .pred_opt()
            .ok_or_else(|| AppError::BadRequest("invalid calendar window".into()))?;
        let rules = self
            .rules
            .find_overlapping(window_start, last_inclusive)
            .await?;

        let entries = window_start
            .iter_days()
            .take_while(|date| *date < window_end)
            .filter_map(|date| {
                let decision = decide(date, &rules);
                decision
                    .is_holiday
                    .then_some(CalendarEntry { date, decision })
            })
            .collect();
        Ok(entries)
    }
}

/// Applies the resolution order to `date`: Sunday, then SPECIAL rules, then
/// SATURDAY_WORKING rules on Saturdays, then the unworked-Saturday default.
pub fn decide(date: NaiveDate, rules: &[HolidayRule]) -> CalendarDecision {
    let weekday = Weekday::of(date);
    if weekday == Weekday::Sunday {
        return CalendarDecision::holiday(CalendarReason::Sunday);
    }

    let mut saturday_working = None;
    for rule in rules.iter().filter(|rule| rule.covers(date)) {
        match rule.kind {
            HolidayRuleKind::Special => {
                return CalendarDecision::holiday(CalendarReason::Special(rule.name.clone()));
            }
            HolidayRuleKind::SaturdayWorking if saturday_working.is_none() => {
                saturday_working = Some(rule);
            }
            HolidayRuleKind::SaturdayWorking => {}
        }
    }

    if weekday == Weekday::Saturday {
        return match saturday_working {
            Some(rule) => {
                CalendarDecision::working(CalendarReason::SaturdayWorking, rule.mapped_day)
            }
            None => CalendarDecision::holiday(CalendarReason::Saturday),
        };
    }

    CalendarDecision::working(CalendarReason::WorkingDay, None)
}

/// Returns `[first day of month, first day of next month)`.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::BadRequest(format!("invalid year/month: {}/{}", year, month)))?;

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        AppError::BadRequest(format!("invalid year/month: {}/{}", next_year, next_month))
    })?;

    Ok((start, end))
}

fn ensure_valid_window(window_start: NaiveDate, window_end: NaiveDate) -> Result<(), AppError> {
    if window_start >= window_end {
        Err(AppError::BadRequest(
            "invalid calendar window: start must be before end".into(),
        ))
    } else {
        Ok(())
    }
}
