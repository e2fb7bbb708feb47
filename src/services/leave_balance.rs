//! Working-day counting and paid-leave (conge) balance.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use derive_more::Display;
use serde::Serialize;
use sqlx::{FromRow, MySqlPool};
use utoipa::ToSchema;

use crate::services::time_calculation::round_half_up;

/// Paid-leave days earned per full month of service.
pub const DEFAULT_LEAVE_DAYS_PER_MONTH: f64 = 1.5;
/// Longest absence a single request may span, in calendar days.
pub const MAX_REQUEST_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum LeaveError {
    #[display(fmt = "start_date {} cannot be after end_date {}", start, end)]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[display(fmt = "a request cannot span more than {} days, got {}", max, days)]
    RangeTooLong { days: i64, max: i64 },
}

impl std::error::Error for LeaveError {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct LeaveBalance {
    pub initial: f64,
    pub accrued: f64,
    /// Approved conge days.
    pub taken: f64,
    /// Conge days awaiting review.
    pub pending: f64,
    /// `initial + accrued - taken`.
    pub available: f64,
}

impl LeaveBalance {
    pub fn compute(initial: f64, accrued: f64, taken: f64, pending: f64) -> Self {
        Self {
            initial,
            accrued,
            taken,
            pending,
            available: round_half_up(initial + accrued - taken, 2),
        }
    }

    /// Whether a new request of `days` fits once pending requests are
    /// accounted for.
    pub fn can_request(&self, days: f64) -> bool {
        days <= self.available - self.pending + f64::EPSILON
    }
}

/// Checks that `[start, end]` is ordered and no longer than
/// [`MAX_REQUEST_DAYS`].
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), LeaveError> {
    if start > end {
        return Err(LeaveError::InvalidRange { start, end });
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_REQUEST_DAYS {
        return Err(LeaveError::RangeTooLong {
            days,
            max: MAX_REQUEST_DAYS,
        });
    }
    Ok(())
}

/// Inclusive count of days in `[start, end]` that are neither weekend days
/// nor holidays.
pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    weekend: &[Weekday],
    holidays: &HashSet<NaiveDate>,
) -> Result<u32, LeaveError> {
    check_range(start, end)?;

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !weekend.contains(&d.weekday()) && !holidays.contains(d))
        .count() as u32)
}

/// Full calendar months between `hire_date` and `as_of`. A month counts
/// once its day-of-month anniversary is reached.
pub fn full_months_between(hire_date: NaiveDate, as_of: NaiveDate) -> u32 {
    if as_of <= hire_date {
        return 0;
    }

    let mut months = (as_of.year() - hire_date.year()) * 12 + as_of.month() as i32
        - hire_date.month() as i32;
    if as_of.day() < hire_date.day() {
        months -= 1;
    }
    months.max(0) as u32
}

pub fn accrued_days(hire_date: NaiveDate, as_of: NaiveDate, per_month: f64) -> f64 {
    round_half_up(full_months_between(hire_date, as_of) as f64 * per_month, 2)
}

#[derive(FromRow)]
struct BalanceInputs {
    hire_date: NaiveDate,
    initial_leave_balance: f64,
    taken: f64,
    pending: f64,
}

/// Loads the conge balance of `user_id` as of `as_of`. `None` when the user
/// does not exist.
pub async fn load_balance(
    pool: &MySqlPool,
    user_id: u64,
    as_of: NaiveDate,
    per_month: f64,
) -> Result<Option<LeaveBalance>, sqlx::Error> {
    let inputs = sqlx::query_as::<_, BalanceInputs>(
        r#"
        SELECT u.hire_date, u.initial_leave_balance,
            COALESCE(SUM(CASE WHEN a.status = 'approved' THEN a.days END), 0) AS taken,
            COALESCE(SUM(CASE WHEN a.status = 'pending' THEN a.days END), 0) AS pending
        FROM users u
        LEFT JOIN absence_requests a ON a.user_id = u.id AND a.absence_type = 'conge'
        WHERE u.id = ?
        GROUP BY u.id, u.hire_date, u.initial_leave_balance
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(inputs.map(|i| {
        LeaveBalance::compute(
            i.initial_leave_balance,
            accrued_days(i.hire_date, as_of, per_month),
            i.taken,
            i.pending,
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn counts_full_months_on_anniversary() {
        assert_eq!(full_months_between(d(2025, 1, 15), d(2025, 2, 14)), 0);
        assert_eq!(full_months_between(d(2025, 1, 15), d(2025, 2, 15)), 1);
        assert_eq!(full_months_between(d(2024, 11, 30), d(2026, 1, 1)), 13);
        assert_eq!(full_months_between(d(2026, 1, 1), d(2025, 1, 1)), 0);
    }

    #[test]
    fn can_request_respects_pending_days() {
        let balance = LeaveBalance::compute(0.0, 6.0, 1.0, 2.0);
        assert_eq!(balance.available, 5.0);
        assert!(balance.can_request(3.0));
        assert!(!balance.can_request(3.5));
    }
}
