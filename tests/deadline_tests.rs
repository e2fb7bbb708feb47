use chrono::NaiveDateTime;
use hr_payroll::model::todo::TaskStatus;
use hr_payroll::services::deadline_check::{
    DeadlineState, classify, next_run_after, status_after_deadline_change,
};
use pretty_assertions::assert_eq;

mod common;
use common::d;

fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
}

#[test]
fn deadlines_are_classified_against_today() {
    let today = d(2026, 5, 10);

    assert_eq!(classify(None, TaskStatus::Todo, today, 1), DeadlineState::NoDeadline);
    assert_eq!(
        classify(Some(d(2026, 5, 9)), TaskStatus::InProgress, today, 1),
        DeadlineState::Overdue
    );
    assert_eq!(
        classify(Some(d(2026, 5, 10)), TaskStatus::Todo, today, 1),
        DeadlineState::DueSoon
    );
    assert_eq!(
        classify(Some(d(2026, 5, 11)), TaskStatus::Todo, today, 1),
        DeadlineState::DueSoon
    );
    assert_eq!(
        classify(Some(d(2026, 5, 12)), TaskStatus::Todo, today, 1),
        DeadlineState::OnTrack
    );
}

#[test]
fn finished_tasks_are_never_overdue() {
    assert_eq!(
        classify(Some(d(2026, 1, 1)), TaskStatus::Done, d(2026, 5, 10), 1),
        DeadlineState::Done
    );
}

#[test]
fn rescheduled_overdue_task_is_reminded_as_todo() {
    let today = d(2026, 5, 10);
    let new_deadline = Some(d(2026, 5, 11));

    let status = status_after_deadline_change(TaskStatus::Overdue, new_deadline, today);

    assert_eq!(status, TaskStatus::Todo);
    assert_eq!(classify(new_deadline, status, today, 1), DeadlineState::DueSoon);
}

#[test]
fn scheduler_runs_later_today_or_tomorrow() {
    assert_eq!(next_run_after(at("2026-05-10 05:30"), 6), at("2026-05-10 06:00"));
    assert_eq!(next_run_after(at("2026-05-10 06:00"), 6), at("2026-05-11 06:00"));
    assert_eq!(next_run_after(at("2026-12-31 23:59"), 6), at("2027-01-01 06:00"));
}
