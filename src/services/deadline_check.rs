//! Daily task deadline check.
//!
//! Runs once a day, either from the in-process scheduler or from the
//! `check-deadlines` command. Overdue tasks are flagged and their assignee
//! is told once; tasks due within the reminder window get one reminder.

use std::str::FromStr;

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::{FromRow, MySqlPool};
use tracing::{error, info, warn};

use crate::model::todo::TaskStatus;
use crate::services::notifier::{NotificationQueue, task_due_soon_message, task_overdue_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    NoDeadline,
    Done,
    Overdue,
    DueSoon,
    OnTrack,
}

pub fn classify(
    deadline: Option<NaiveDate>,
    status: TaskStatus,
    today: NaiveDate,
    reminder_days: i64,
) -> DeadlineState {
    if status == TaskStatus::Done {
        return DeadlineState::Done;
    }

    match deadline {
        None => DeadlineState::NoDeadline,
        Some(d) if d < today => DeadlineState::Overdue,
        Some(d) if (d - today).num_days() <= reminder_days => DeadlineState::DueSoon,
        Some(_) => DeadlineState::OnTrack,
    }
}

/// Status a task should carry once its deadline is edited. An overdue task
/// whose deadline is no longer past goes back to `todo`.
pub fn status_after_deadline_change(
    status: TaskStatus,
    deadline: Option<NaiveDate>,
    today: NaiveDate,
) -> TaskStatus {
    match (status, deadline) {
        (TaskStatus::Overdue, None) => TaskStatus::Todo,
        (TaskStatus::Overdue, Some(d)) if d >= today => TaskStatus::Todo,
        _ => status,
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineReport {
    pub checked: u32,
    pub marked_overdue: u32,
    pub overdue_notifications: u32,
    pub reminders: u32,
}

#[derive(FromRow)]
struct DueTask {
    id: u64,
    title: String,
    deadline: Option<NaiveDate>,
    status: String,
    reminder_sent_at: Option<NaiveDateTime>,
    overdue_notified_at: Option<NaiveDateTime>,
    phone: Option<String>,
}

/// Queues a deadline message for the assignee; false when nothing was
/// queued (no deadline, no phone or an invalid one).
fn queue_notice(
    queue: &NotificationQueue,
    task: &DueTask,
    build: fn(&str, NaiveDate) -> String,
) -> bool {
    task.deadline
        .is_some_and(|deadline| queue.enqueue(task.phone.as_deref(), build(&task.title, deadline)))
}

pub async fn run_deadline_check(
    pool: &MySqlPool,
    queue: &NotificationQueue,
    today: NaiveDate,
    reminder_days: i64,
) -> Result<DeadlineReport> {
    let horizon = today + Duration::days(reminder_days.max(0));

    let tasks = sqlx::query_as::<_, DueTask>(
        r#"
        SELECT t.id, t.title, t.deadline, t.status, t.reminder_sent_at, t.overdue_notified_at,
            u.phone
        FROM todo_tasks t
        LEFT JOIN users u ON u.id = t.assignee_id
        WHERE t.deadline IS NOT NULL
        AND t.deadline <= ?
        AND t.status <> 'done'
        "#,
    )
    .bind(horizon)
    .fetch_all(pool)
    .await?;

    let mut report = DeadlineReport::default();

    for task in tasks {
        report.checked += 1;

        let status = match TaskStatus::from_str(&task.status) {
            Ok(s) => s,
            Err(_) => {
                warn!(task_id = task.id, status = %task.status, "Unknown task status, skipped");
                continue;
            }
        };

        match classify(task.deadline, status, today, reminder_days) {
            DeadlineState::Overdue => {
                if status != TaskStatus::Overdue {
                    sqlx::query("UPDATE todo_tasks SET status = 'overdue' WHERE id = ?")
                        .bind(task.id)
                        .execute(pool)
                        .await?;
                    report.marked_overdue += 1;
                }

                if task.overdue_notified_at.is_none() {
                    let queued = queue_notice(queue, &task, task_overdue_message);
                    sqlx::query("UPDATE todo_tasks SET overdue_notified_at = NOW() WHERE id = ?")
                        .bind(task.id)
                        .execute(pool)
                        .await?;
                    if queued {
                        report.overdue_notifications += 1;
                    }
                }
            }
            DeadlineState::DueSoon if task.reminder_sent_at.is_none() => {
                let queued = queue_notice(queue, &task, task_due_soon_message);
                sqlx::query("UPDATE todo_tasks SET reminder_sent_at = NOW() WHERE id = ?")
                    .bind(task.id)
                    .execute(pool)
                    .await?;
                if queued {
                    report.reminders += 1;
                }
            }
            _ => {}
        }
    }

    info!(
        checked = report.checked,
        marked_overdue = report.marked_overdue,
        overdue_notifications = report.overdue_notifications,
        reminders = report.reminders,
        %today,
        "Deadline check complete"
    );

    Ok(report)
}

/// Next occurrence of `hour:00` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today_run = now.date().and_time(at);
    if today_run > now {
        today_run
    } else {
        today_run + Duration::days(1)
    }
}

/// Runs the deadline check every day at `hour` (local time). Never returns.
pub async fn run_daily_scheduler(
    pool: MySqlPool,
    queue: NotificationQueue,
    hour: u32,
    reminder_days: i64,
) {
    loop {
        let now = Local::now().naive_local();
        let next = next_run_after(now, hour);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, "Deadline check scheduled");

        tokio::time::sleep(wait).await;

        let today = Local::now().date_naive();
        if let Err(e) = run_deadline_check(&pool, &queue, today, reminder_days).await {
            error!(error = %e, "Deadline check failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::Channel;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn next_run_rolls_to_tomorrow_once_hour_passed() {
        let morning = d(2026, 3, 10).and_hms_opt(5, 59, 0).unwrap();
        assert_eq!(
            next_run_after(morning, 6),
            d(2026, 3, 10).and_hms_opt(6, 0, 0).unwrap()
        );

        let exactly = d(2026, 3, 10).and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(
            next_run_after(exactly, 6),
            d(2026, 3, 11).and_hms_opt(6, 0, 0).unwrap()
        );
    }

    fn due_task(phone: Option<&str>) -> DueTask {
        DueTask {
            id: 1,
            title: "Inventory".to_string(),
            deadline: Some(d(2026, 3, 9)),
            status: "todo".to_string(),
            reminder_sent_at: None,
            overdue_notified_at: None,
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn only_queued_notices_are_counted() {
        let (queue, mut receiver) = NotificationQueue::new(Channel::Sms, "212");

        assert!(!queue_notice(&queue, &due_task(None), task_overdue_message));
        assert!(!queue_notice(&queue, &due_task(Some("12")), task_overdue_message));
        assert!(receiver.try_recv().is_err());

        assert!(queue_notice(&queue, &due_task(Some("0612345678")), task_overdue_message));
        let sent = receiver.try_recv().unwrap();
        assert_eq!(sent.to, "+212612345678");
    }

    #[test]
    fn pushed_back_deadline_reopens_overdue_task() {
        let today = d(2026, 3, 10);

        assert_eq!(
            status_after_deadline_change(TaskStatus::Overdue, Some(d(2026, 3, 20)), today),
            TaskStatus::Todo
        );
        assert_eq!(
            status_after_deadline_change(TaskStatus::Overdue, Some(today), today),
            TaskStatus::Todo
        );
        assert_eq!(
            status_after_deadline_change(TaskStatus::Overdue, Some(d(2026, 3, 9)), today),
            TaskStatus::Overdue
        );
        assert_eq!(
            status_after_deadline_change(TaskStatus::InProgress, Some(d(2026, 3, 20)), today),
            TaskStatus::InProgress
        );
    }
}
