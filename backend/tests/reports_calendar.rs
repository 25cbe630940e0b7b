use chrono::Duration;
use rollcall_backend::{
    error::AppError,
    models::{
        attendance::{AttendanceEvent, AttendanceStatus, MarkingMode},
        holiday::HolidayRule,
        student::Student,
        timetable::{PeriodEntry, Timetable, Weekday},
    },
    repositories::AttendanceEventRepositoryTrait,
    services::calendar::CalendarReason,
};

mod support;

use support::{date, monday, seed_class, test_app, utc};

async fn record(app: &support::TestApp, student: &Student, day: chrono::NaiveDate, period: i16, status: AttendanceStatus) {
    let event = AttendanceEvent::class(
        student.id,
        student.class_id,
        day,
        period,
        status,
        MarkingMode::Ble,
        utc(day, 9, 0),
    );
    AttendanceEventRepositoryTrait::insert(&app.store, &event)
        .await
        .unwrap()
        .expect("fresh event");
}

#[tokio::test]
async fn report_counts_presence_per_student() {
    let app = test_app(utc(monday(), 16, 0));
    let (class_id, students) = seed_class(&app.store, 2);

    let mut marked = 0;
    for offset in 0..5 {
        let day = monday() + Duration::days(offset);
        for period in 1..=2 {
            let status = if marked < 8 {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            };
            record(&app, &students[0], day, period, status).await;
            marked += 1;
        }
    }
    record(&app, &students[1], monday(), 1, AttendanceStatus::Late).await;
    // Outside the window.
    record(&app, &students[1], date(2025, 4, 14), 1, AttendanceStatus::Present).await;

    let rows = app
        .state
        .reports
        .summarize(class_id, monday(), date(2025, 4, 11))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].student_id, students[0].id);
    assert_eq!(rows[0].total_classes, 10);
    assert_eq!(rows[0].present, 8);
    assert_eq!(rows[0].absent, 2);
    assert_eq!(rows[0].percentage, 80);

    assert_eq!(rows[1].total_classes, 1);
    assert_eq!(rows[1].present, 0);
    assert_eq!(rows[1].percentage, 0);
}

#[tokio::test]
async fn report_rejects_inverted_range() {
    let app = test_app(utc(monday(), 16, 0));
    let (class_id, _) = seed_class(&app.store, 1);
    let result = app
        .state
        .reports
        .summarize(class_id, date(2025, 4, 11), monday())
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn calendar_applies_rule_precedence() {
    let app = test_app(utc(monday(), 8, 0));
    let working_saturday = date(2025, 4, 12);
    app.store.add_holiday_rule(HolidayRule::saturday_working(
        "Make-up day",
        working_saturday,
        working_saturday,
        Some(Weekday::Monday),
    ));
    app.store.add_holiday_rule(HolidayRule::special(
        "Spring break",
        date(2025, 4, 14),
        date(2025, 4, 19),
    ));
    app.store.add_holiday_rule(HolidayRule::saturday_working(
        "Cancelled make-up",
        date(2025, 4, 19),
        date(2025, 4, 19),
        None,
    ));

    let sunday = app.state.calendar.resolve(date(2025, 4, 6)).await.unwrap();
    assert!(sunday.is_holiday);
    assert_eq!(sunday.reason, CalendarReason::Sunday);

    let saturday = app.state.calendar.resolve(date(2025, 4, 5)).await.unwrap();
    assert!(saturday.is_holiday);
    assert_eq!(saturday.reason, CalendarReason::Saturday);

    let make_up = app.state.calendar.resolve(working_saturday).await.unwrap();
    assert!(make_up.is_working_day);
    assert_eq!(make_up.mapped_day, Some(Weekday::Monday));

    let special_over_working = app.state.calendar.resolve(date(2025, 4, 19)).await.unwrap();
    assert!(special_over_working.is_holiday);
    assert_eq!(
        special_over_working.reason,
        CalendarReason::Special("Spring break".into())
    );

    let weekday = app.state.calendar.resolve(monday()).await.unwrap();
    assert!(weekday.is_working_day);
    assert_eq!(weekday.reason, CalendarReason::WorkingDay);

    // Four Sundays plus Saturdays 5, 19, 26, plus the break on 14-18.
    let month = app.state.calendar.list_month(2025, 4).await.unwrap();
    assert_eq!(month.len(), 12);
    assert!(month.iter().all(|entry| entry.decision.is_holiday));
    assert!(month.iter().all(|entry| entry.date != working_saturday));
}

#[tokio::test]
async fn working_saturday_follows_the_mapped_timetable() {
    let app = test_app(utc(monday(), 8, 0));
    let (class_id, _) = seed_class(&app.store, 1);
    let working_saturday = date(2025, 4, 12);
    app.store.add_holiday_rule(HolidayRule::saturday_working(
        "Make-up day",
        working_saturday,
        working_saturday,
        Some(Weekday::Wednesday),
    ));

    let mut timetable = Timetable::new(class_id);
    timetable.set_day(
        Weekday::Wednesday,
        vec![
            PeriodEntry {
                period: 2,
                subject: "Physics".into(),
                teacher_id: None,
            },
            PeriodEntry {
                period: 1,
                subject: "Mathematics".into(),
                teacher_id: None,
            },
        ],
    );
    app.store.set_timetable(timetable.clone());

    let decision = app.state.calendar.resolve(working_saturday).await.unwrap();
    let periods = timetable.periods_on(working_saturday, &decision);
    assert_eq!(periods.len(), 2);
    assert_eq!(periods[0].subject, "Mathematics");

    let plain_saturday = date(2025, 4, 5);
    let decision = app.state.calendar.resolve(plain_saturday).await.unwrap();
    assert!(timetable.periods_on(plain_saturday, &decision).is_empty());
}
