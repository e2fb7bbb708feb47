use hr_payroll::model::pointage::Pointage;
use hr_payroll::services::time_calculation::{
    ShiftPolicy, compute_daily, month_start, summarize_month,
};
use pretty_assertions::assert_eq;

mod common;
use common::{d, t};

fn pointage(id: u64, user_id: u64, date: chrono::NaiveDate, check_in: (u32, u32), check_out: Option<(u32, u32)>) -> Pointage {
    Pointage {
        id,
        user_id,
        date,
        check_in: t(check_in.0, check_in.1),
        check_out: check_out.map(|(h, m)| t(h, m)),
        day_hours: 0.0,
        night_hours: 0.0,
        worked_hours: 0.0,
        normal_hours: 0.0,
        overtime_hours: 0.0,
    }
}

#[test]
fn office_day_is_eight_normal_hours_after_pause() {
    let hours = compute_daily(t(8, 30), t(17, 30), &ShiftPolicy::default());

    assert_eq!(hours.day_hours, 8.0);
    assert_eq!(hours.night_hours, 0.0);
    assert_eq!(hours.pause_hours, 1.0);
    assert_eq!(hours.worked_hours, 8.0);
    assert_eq!(hours.normal_hours, 8.0);
    assert_eq!(hours.overtime_hours, 0.0);
}

#[test]
fn night_shift_splits_across_midnight() {
    let hours = compute_daily(t(22, 0), t(6, 0), &ShiftPolicy::default());

    // 22h-24h is day time, 24h-30h falls in the next night window
    assert_eq!(hours.day_hours, 2.0);
    assert_eq!(hours.night_hours, 6.0);
    assert_eq!(hours.pause_hours, 0.0);
    assert_eq!(hours.worked_hours, 8.0);
    assert_eq!(hours.overtime_hours, 0.0);
}

#[test]
fn long_day_produces_overtime() {
    let hours = compute_daily(t(7, 0), t(19, 0), &ShiftPolicy::default());

    assert_eq!(hours.night_hours, 1.0);
    assert_eq!(hours.day_hours, 10.0);
    assert_eq!(hours.worked_hours, 11.0);
    assert_eq!(hours.normal_hours, 8.0);
    assert_eq!(hours.overtime_hours, 3.0);
}

#[test]
fn seven_hour_portion_has_no_pause() {
    let hours = compute_daily(t(9, 0), t(16, 0), &ShiftPolicy::default());

    assert_eq!(hours.day_hours, 7.0);
    assert_eq!(hours.pause_hours, 0.0);
    assert_eq!(hours.worked_hours, 7.0);
}

#[test]
fn long_night_portion_loses_an_hour() {
    let hours = compute_daily(t(0, 0), t(8, 0), &ShiftPolicy::default());

    assert_eq!(hours.night_hours, 7.0);
    assert_eq!(hours.day_hours, 0.0);
    assert_eq!(hours.pause_hours, 1.0);
    assert_eq!(hours.worked_hours, 7.0);
}

#[test]
fn evening_to_morning_shift_reaches_next_night_window() {
    let hours = compute_daily(t(20, 0), t(8, 0), &ShiftPolicy::default());

    // 20h-24h day, 24h-32h night with the pause taken from it
    assert_eq!(hours.day_hours, 4.0);
    assert_eq!(hours.night_hours, 7.0);
    assert_eq!(hours.pause_hours, 1.0);
    assert_eq!(hours.worked_hours, 11.0);
    assert_eq!(hours.normal_hours, 8.0);
    assert_eq!(hours.overtime_hours, 3.0);
}

#[test]
fn worked_is_always_normal_plus_overtime() {
    let policy = ShiftPolicy::default();
    let shifts = [
        ((8, 30), (17, 30)),
        ((22, 0), (6, 0)),
        ((7, 0), (19, 0)),
        ((9, 0), (16, 0)),
        ((0, 0), (8, 0)),
        ((20, 0), (8, 0)),
        ((9, 0), (15, 20)),
        ((6, 45), (23, 10)),
        ((13, 0), (12, 59)),
    ];

    for ((in_h, in_m), (out_h, out_m)) in shifts {
        let hours = compute_daily(t(in_h, in_m), t(out_h, out_m), &policy);
        let split = hours.normal_hours + hours.overtime_hours;
        assert!(
            (hours.worked_hours - split).abs() < 1e-9,
            "{in_h}:{in_m}-{out_h}:{out_m}: worked {} != normal {} + overtime {}",
            hours.worked_hours,
            hours.normal_hours,
            hours.overtime_hours
        );
        assert!(hours.normal_hours <= policy.normal_day_hours);
        assert!(hours.overtime_hours >= 0.0);
    }
}

#[test]
fn identical_entry_and_exit_is_zero() {
    let hours = compute_daily(t(9, 0), t(9, 0), &ShiftPolicy::default());
    assert_eq!(hours.worked_hours, 0.0);
    assert_eq!(hours.normal_hours, 0.0);
}

#[test]
fn odd_minutes_are_rounded_to_two_decimals() {
    // 09:00-15:20 is 6h20 = 6.333.. hours
    let hours = compute_daily(t(9, 0), t(15, 20), &ShiftPolicy::default());
    assert_eq!(hours.worked_hours, 6.33);
    assert_eq!(hours.overtime_hours, 0.0);
}

#[test]
fn month_summary_skips_open_and_foreign_pointages() {
    let policy = ShiftPolicy::default();
    let pointages = vec![
        pointage(1, 7, d(2026, 1, 5), (8, 30), Some((17, 30))),
        pointage(2, 7, d(2026, 1, 6), (7, 0), Some((19, 0))),
        pointage(3, 7, d(2026, 1, 7), (22, 0), Some((6, 0))),
        // still open
        pointage(4, 7, d(2026, 1, 8), (8, 0), None),
        // other month, other user
        pointage(5, 7, d(2026, 2, 1), (8, 0), Some((20, 0))),
        pointage(6, 8, d(2026, 1, 5), (8, 0), Some((20, 0))),
    ];

    let summary = summarize_month(7, d(2026, 1, 15), &pointages, &policy);

    assert_eq!(summary.month, d(2026, 1, 1));
    assert_eq!(summary.days_worked, 3);
    assert_eq!(summary.incomplete_days, 1);
    assert_eq!(summary.worked_hours, 27.0);
    assert_eq!(summary.normal_hours, 24.0);
    assert_eq!(summary.overtime_hours, 3.0);
    assert_eq!(summary.night_hours, 7.0);
}

#[test]
fn month_start_is_first_day() {
    assert_eq!(month_start(d(2026, 12, 31)), d(2026, 12, 1));
}
