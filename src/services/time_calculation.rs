//! Day/night split and overtime arithmetic for pointages.
//!
//! Hours are measured from midnight of the pointage day. A shift whose exit
//! is not after its entry ends on the following day, so a shift spans at
//! most `[0h, 48h)` on that axis. Two windows of that axis are night work:
//! `[0h, 8h)` (early morning of the pointage day) and `[24h, 32h)` (early
//! morning of the next day). Everything else is day work.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::pointage::Pointage;

/// End of the first night window, in hours from midnight.
pub const NIGHT_MORNING_END: f64 = 8.0;
/// Start of the next-day night window.
pub const NEXT_NIGHT_START: f64 = 24.0;
/// End of the next-day night window.
pub const NEXT_NIGHT_END: f64 = 32.0;
/// A day or night portion longer than this gets a pause deducted.
pub const PAUSE_THRESHOLD_HOURS: f64 = 7.0;
/// Pause deducted from a portion above [`PAUSE_THRESHOLD_HOURS`].
pub const PAUSE_DEDUCTION_HOURS: f64 = 1.0;
/// Worked hours above this are overtime.
pub const NORMAL_DAY_HOURS: f64 = 8.0;
/// Added to the exit when it is not after the entry.
pub const MIDNIGHT_ROLLOVER_HOURS: f64 = 24.0;
/// Decimals kept on every computed figure.
pub const HOURS_PRECISION: u32 = 2;

// Absorbs binary representation error (2.675 is stored as 2.67499999...).
const ROUNDING_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftPolicy {
    pub night_morning_end: f64,
    pub next_night_start: f64,
    pub next_night_end: f64,
    pub pause_threshold: f64,
    pub pause_deduction: f64,
    pub normal_day_hours: f64,
    pub rollover_hours: f64,
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        Self {
            night_morning_end: NIGHT_MORNING_END,
            next_night_start: NEXT_NIGHT_START,
            next_night_end: NEXT_NIGHT_END,
            pause_threshold: PAUSE_THRESHOLD_HOURS,
            pause_deduction: PAUSE_DEDUCTION_HOURS,
            normal_day_hours: NORMAL_DAY_HOURS,
            rollover_hours: MIDNIGHT_ROLLOVER_HOURS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, ToSchema)]
pub struct DailyHours {
    #[schema(example = 8.0)]
    pub day_hours: f64,
    #[schema(example = 0.0)]
    pub night_hours: f64,
    #[schema(example = 1.0)]
    pub pause_hours: f64,
    #[schema(example = 8.0)]
    pub worked_hours: f64,
    #[schema(example = 8.0)]
    pub normal_hours: f64,
    #[schema(example = 0.0)]
    pub overtime_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlySummary {
    pub user_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub month: NaiveDate,
    pub days_worked: u32,
    pub incomplete_days: u32,
    pub worked_hours: f64,
    pub normal_hours: f64,
    pub overtime_hours: f64,
    pub night_hours: f64,
}

/// Rounds to `decimals` places, halves away from zero.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = (value.abs() * factor + 0.5 + ROUNDING_EPSILON).floor();
    (scaled / factor).copysign(value)
}

/// Decimal hours since midnight.
pub fn hours_of(time: NaiveTime) -> f64 {
    time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0
}

/// Length of a shift in hours. An exit before the entry is on the next day;
/// identical times yield zero.
pub fn shift_duration(check_in: NaiveTime, check_out: NaiveTime, policy: &ShiftPolicy) -> f64 {
    let start = hours_of(check_in);
    let end = hours_of(check_out);

    if end > start {
        end - start
    } else if end < start {
        end + policy.rollover_hours - start
    } else {
        0.0
    }
}

fn overlap(start: f64, end: f64, window_start: f64, window_end: f64) -> f64 {
    (end.min(window_end) - start.max(window_start)).max(0.0)
}

/// Splits `[start, end)` (hours from midnight of the pointage day) into
/// `(day, night)` hours.
pub fn split_day_night(start: f64, end: f64, policy: &ShiftPolicy) -> (f64, f64) {
    if end <= start {
        return (0.0, 0.0);
    }

    let night = overlap(start, end, 0.0, policy.night_morning_end)
        + overlap(start, end, policy.next_night_start, policy.next_night_end);
    let day = (end - start) - night;

    (day, night)
}

fn deduct_pause(portion: f64, policy: &ShiftPolicy) -> (f64, f64) {
    if portion > policy.pause_threshold {
        (portion - policy.pause_deduction, policy.pause_deduction)
    } else {
        (portion, 0.0)
    }
}

pub fn compute_daily(check_in: NaiveTime, check_out: NaiveTime, policy: &ShiftPolicy) -> DailyHours {
    let start = hours_of(check_in);
    let end = start + shift_duration(check_in, check_out, policy);

    let (day_raw, night_raw) = split_day_night(start, end, policy);
    let (day, day_pause) = deduct_pause(day_raw, policy);
    let (night, night_pause) = deduct_pause(night_raw, policy);

    let day = round_half_up(day, HOURS_PRECISION);
    let night = round_half_up(night, HOURS_PRECISION);
    let worked = round_half_up(day + night, HOURS_PRECISION);
    let normal = worked.min(policy.normal_day_hours);
    let overtime = round_half_up((worked - policy.normal_day_hours).max(0.0), HOURS_PRECISION);

    DailyHours {
        day_hours: day,
        night_hours: night,
        pause_hours: round_half_up(day_pause + night_pause, HOURS_PRECISION),
        worked_hours: worked,
        normal_hours: normal,
        overtime_hours: overtime,
    }
}

/// First day of the month `date` falls in.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Sums the pointages of one user over one month. Open pointages (no
/// check-out) are counted as incomplete and add no hours. Pointages outside
/// the month are ignored.
pub fn summarize_month(
    user_id: u64,
    month: NaiveDate,
    pointages: &[Pointage],
    policy: &ShiftPolicy,
) -> MonthlySummary {
    let month = month_start(month);
    let mut summary = MonthlySummary {
        user_id,
        month,
        days_worked: 0,
        incomplete_days: 0,
        worked_hours: 0.0,
        normal_hours: 0.0,
        overtime_hours: 0.0,
        night_hours: 0.0,
    };

    for pointage in pointages
        .iter()
        .filter(|p| p.user_id == user_id && month_start(p.date) == month)
    {
        match pointage.check_out {
            Some(check_out) => {
                let hours = compute_daily(pointage.check_in, check_out, policy);
                summary.days_worked += 1;
                summary.worked_hours += hours.worked_hours;
                summary.normal_hours += hours.normal_hours;
                summary.overtime_hours += hours.overtime_hours;
                summary.night_hours += hours.night_hours;
            }
            None => summary.incomplete_days += 1,
        }
    }

    summary.worked_hours = round_half_up(summary.worked_hours, HOURS_PRECISION);
    summary.normal_hours = round_half_up(summary.normal_hours, HOURS_PRECISION);
    summary.overtime_hours = round_half_up(summary.overtime_hours, HOURS_PRECISION);
    summary.night_hours = round_half_up(summary.night_hours, HOURS_PRECISION);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn rounds_halves_away_from_zero() {
        assert_eq!(round_half_up(2.675, 2), 2.68);
        assert_eq!(round_half_up(2.674, 2), 2.67);
        assert_eq!(round_half_up(-1.005, 2), -1.01);
        assert_eq!(round_half_up(0.5, 0), 1.0);
        assert_eq!(round_half_up(7.0, 2), 7.0);
    }

    #[test]
    fn hours_of_includes_minutes_and_seconds() {
        assert_eq!(hours_of(t(8, 30)), 8.5);
        assert_eq!(hours_of(NaiveTime::from_hms_opt(0, 0, 36).unwrap()), 0.01);
    }

    #[test]
    fn exit_before_entry_rolls_over_midnight() {
        let policy = ShiftPolicy::default();
        assert_eq!(shift_duration(t(22, 0), t(6, 0), &policy), 8.0);
        assert_eq!(shift_duration(t(9, 0), t(9, 0), &policy), 0.0);
    }

    #[test]
    fn split_counts_both_night_windows() {
        let policy = ShiftPolicy::default();
        assert_eq!(split_day_night(6.0, 10.0, &policy), (2.0, 2.0));
        assert_eq!(split_day_night(20.0, 34.0, &policy), (6.0, 8.0));
        assert_eq!(split_day_night(10.0, 10.0, &policy), (0.0, 0.0));
    }
}
