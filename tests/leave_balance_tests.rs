use std::collections::HashSet;

use chrono::Weekday;
use hr_payroll::services::leave_balance::{
    LeaveBalance, LeaveError, MAX_REQUEST_DAYS, accrued_days, check_range, full_months_between,
    working_days,
};
use pretty_assertions::assert_eq;

mod common;
use common::d;

const WEEKEND: [Weekday; 2] = [Weekday::Sat, Weekday::Sun];

#[test]
fn working_days_skip_weekends_and_holidays() {
    let none = HashSet::new();
    // Monday 2 March to Sunday 8 March 2026
    assert_eq!(working_days(d(2026, 3, 2), d(2026, 3, 8), &WEEKEND, &none), Ok(5));

    let holidays: HashSet<_> = [d(2026, 3, 4)].into_iter().collect();
    assert_eq!(working_days(d(2026, 3, 2), d(2026, 3, 8), &WEEKEND, &holidays), Ok(4));
}

#[test]
fn single_weekend_day_counts_nothing() {
    assert_eq!(
        working_days(d(2026, 3, 7), d(2026, 3, 7), &WEEKEND, &HashSet::new()),
        Ok(0)
    );
}

#[test]
fn custom_weekend_is_honoured() {
    let friday_weekend = [Weekday::Fri];
    // Friday 6 March 2026 to Sunday 8 March 2026
    assert_eq!(
        working_days(d(2026, 3, 6), d(2026, 3, 8), &friday_weekend, &HashSet::new()),
        Ok(2)
    );
}

#[test]
fn reversed_range_is_rejected() {
    let err = working_days(d(2026, 3, 9), d(2026, 3, 2), &WEEKEND, &HashSet::new()).unwrap_err();
    assert_eq!(
        err,
        LeaveError::InvalidRange {
            start: d(2026, 3, 9),
            end: d(2026, 3, 2)
        }
    );
}

#[test]
fn ranges_longer_than_a_year_are_rejected() {
    // 2028 is a leap year: 366 days is the longest accepted span
    assert_eq!(check_range(d(2028, 1, 1), d(2028, 12, 31)), Ok(()));
    assert_eq!(
        check_range(d(2026, 1, 1), d(2027, 1, 2)),
        Err(LeaveError::RangeTooLong {
            days: 367,
            max: MAX_REQUEST_DAYS
        })
    );

    let err = working_days(d(2026, 1, 1), d(9999, 12, 31), &WEEKEND, &HashSet::new()).unwrap_err();
    assert!(matches!(err, LeaveError::RangeTooLong { .. }));
}

#[test]
fn accrual_counts_full_months_only() {
    assert_eq!(full_months_between(d(2025, 1, 15), d(2026, 1, 14)), 11);
    assert_eq!(full_months_between(d(2025, 1, 15), d(2026, 1, 15)), 12);
    assert_eq!(full_months_between(d(2026, 1, 15), d(2025, 1, 15)), 0);
    assert_eq!(accrued_days(d(2025, 1, 15), d(2026, 1, 15), 1.5), 18.0);
}

#[test]
fn pending_days_reduce_what_can_be_requested() {
    let balance = LeaveBalance::compute(0.0, 18.0, 5.0, 3.0);

    assert_eq!(balance.available, 13.0);
    assert!(balance.can_request(10.0));
    assert!(!balance.can_request(10.5));
}
