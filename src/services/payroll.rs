//! Monthly salary arithmetic.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::time_calculation::round_half_up;

/// Legal monthly working hours used to derive the hourly rate.
pub const DEFAULT_MONTHLY_HOURS: f64 = 191.0;
/// Overtime pay multiplier applied to the hourly rate.
pub const DEFAULT_OVERTIME_RATE: f64 = 1.25;

const MONEY_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayPolicy {
    pub monthly_hours: f64,
    pub overtime_rate: f64,
}

impl Default for PayPolicy {
    fn default() -> Self {
        Self {
            monthly_hours: DEFAULT_MONTHLY_HOURS,
            overtime_rate: DEFAULT_OVERTIME_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SalaryBreakdown {
    pub base_salary: f64,
    pub hourly_rate: f64,
    pub overtime_hours: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_salary: f64,
}

pub fn compute_salary(
    base_salary: f64,
    overtime_hours: f64,
    bonus: f64,
    deductions: f64,
    policy: &PayPolicy,
) -> SalaryBreakdown {
    let hourly_rate = if policy.monthly_hours > 0.0 {
        base_salary / policy.monthly_hours
    } else {
        0.0
    };
    let overtime_pay = round_half_up(
        overtime_hours.max(0.0) * hourly_rate * policy.overtime_rate,
        MONEY_PRECISION,
    );
    let net_salary = round_half_up(base_salary + overtime_pay + bonus - deductions, MONEY_PRECISION);

    SalaryBreakdown {
        base_salary,
        hourly_rate: round_half_up(hourly_rate, MONEY_PRECISION),
        overtime_hours,
        overtime_pay,
        bonus,
        deductions,
        net_salary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_includes_overtime_at_premium_rate() {
        let s = compute_salary(1910.0, 4.0, 100.0, 50.0, &PayPolicy::default());
        assert_eq!(s.hourly_rate, 10.0);
        assert_eq!(s.overtime_pay, 50.0);
        assert_eq!(s.net_salary, 2010.0);
    }

    #[test]
    fn zero_monthly_hours_pays_no_overtime() {
        let policy = PayPolicy {
            monthly_hours: 0.0,
            overtime_rate: 1.25,
        };
        let s = compute_salary(3000.0, 10.0, 0.0, 0.0, &policy);
        assert_eq!(s.overtime_pay, 0.0);
        assert_eq!(s.net_salary, 3000.0);
    }
}
