use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppError;
use crate::models::attendance::{AttendanceEvent, AttendanceType};
use crate::models::student::Student;
use crate::repositories::{AttendanceEventRepositoryTrait, StudentRepositoryTrait};
use crate::types::{ClassId, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentSummary {
    pub student_id: StudentId,
    pub name: String,
    pub roll_number: String,
    pub total_classes: u32,
    pub present: u32,
    pub absent: u32,
    pub percentage: u32,
}

/// Rounded share of `present` in `total`, half away from zero; 0 when there
/// were no classes.
pub fn attendance_percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (present, total) = (u64::from(present), u64::from(total));
    ((present * 200 + total) / (total * 2)) as u32
}

/// Groups CLASS events by student. Every roster entry gets a row, events of
/// students missing from the roster are ignored. Rows follow roll number.
pub fn summarize_events(roster: &[Student], events: &[AttendanceEvent]) -> Vec<StudentSummary> {
    let mut counts: BTreeMap<StudentId, (u32, u32)> = BTreeMap::new();
    for event in events
        .iter()
        .filter(|event| event.attendance_type == AttendanceType::Class)
    {
        let entry = counts.entry(event.student_id).or_default();
        entry.0 += 1;
        if event.is_present() {
            entry.1 += 1;
        }
    }

    let mut rows: Vec<StudentSummary> = roster
        .iter()
        .map(|student| {
            let (total, present) = counts.get(&student.id).copied().unwrap_or_default();
            StudentSummary {
                student_id: student.id,
                name: student.name.clone(),
                roll_number: student.roll_number.clone(),
                total_classes: total,
                present,
                absent: total - present,
                percentage: attendance_percentage(present, total),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.roll_number
            .cmp(&b.roll_number)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    rows
}

#[derive(Clone)]
pub struct ReportAggregator {
    events: Arc<dyn AttendanceEventRepositoryTrait>,
    students: Arc<dyn StudentRepositoryTrait>,
}

impl ReportAggregator {
    pub fn new(
        events: Arc<dyn AttendanceEventRepositoryTrait>,
        students: Arc<dyn StudentRepositoryTrait>,
    ) -> Self {
        Self { events, students }
    }

    pub async fn summarize(
        &self,
        class_id: ClassId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StudentSummary>, AppError> {
        if start > end {
            return Err(AppError::BadRequest(
                "start date must not be after end date".into(),
            ));
        }

        let events = self.events.list_class_events(class_id, start, end).await?;
        let mut roster = self.students.list_by_class(class_id).await?;

        // Students who left the class still own their historical events.
        let known: HashSet<StudentId> = roster.iter().map(|student| student.id).collect();
        let departed: HashSet<StudentId> = events
            .iter()
            .map(|event| event.student_id)
            .filter(|id| !known.contains(id))
            .collect();
        for student_id in departed {
            match self.students.find_by_id(student_id).await? {
                Some(student) => roster.push(student),
                None => tracing::warn!(
                    student_id = %student_id,
                    class_id = %class_id,
                    "Report skipped events of unknown student"
                ),
            }
        }

        Ok(summarize_events(&roster, &events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance::{AttendanceStatus, MarkingMode};
    use chrono::{TimeZone, Utc};

    fn class_event(student: &Student, day: u32, period: i16, status: AttendanceStatus) -> AttendanceEvent {
        let now = Utc.with_ymd_and_hms(2025, 4, day, 9, 0, 0).unwrap();
        AttendanceEvent::class(
            student.id,
            student.class_id,
            now.date_naive(),
            period,
            status,
            MarkingMode::Ble,
            now,
        )
    }

    #[test]
    fn percentage_rounds_half_up_and_handles_zero() {
        assert_eq!(attendance_percentage(8, 10), 80);
        assert_eq!(attendance_percentage(2, 3), 67);
        assert_eq!(attendance_percentage(1, 8), 13);
        assert_eq!(attendance_percentage(1, 3), 33);
        assert_eq!(attendance_percentage(0, 0), 0);
        assert_eq!(attendance_percentage(5, 5), 100);
    }

    #[test]
    fn late_counts_as_not_present() {
        let class_id = ClassId::new();
        let student = Student::new(class_id, "Chen", "07");
        let events = vec![
            class_event(&student, 7, 1, AttendanceStatus::Present),
            class_event(&student, 7, 2, AttendanceStatus::Late),
            class_event(&student, 8, 1, AttendanceStatus::Absent),
        ];
        let rows = summarize_events(&[student], &events);
        assert_eq!(rows[0].total_classes, 3);
        assert_eq!(rows[0].present, 1);
        assert_eq!(rows[0].absent, 2);
        assert_eq!(rows[0].percentage, 33);
    }

    #[test]
    fn roster_students_without_events_get_zero_rows_in_roll_order() {
        let class_id = ClassId::new();
        let b = Student::new(class_id, "Bela", "02");
        let a = Student::new(class_id, "Arun", "01");
        let rows = summarize_events(&[b.clone(), a.clone()], &[class_event(&b, 7, 1, AttendanceStatus::Present)]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student_id, a.id);
        assert_eq!(rows[0].total_classes, 0);
        assert_eq!(rows[0].percentage, 0);
        assert_eq!(rows[1].percentage, 100);
    }
}
