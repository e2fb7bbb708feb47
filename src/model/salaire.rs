use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Salaire {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    #[schema(example = 8000.0)]
    pub base_salary: f64,
    #[schema(example = 6.5)]
    pub overtime_hours: f64,
    #[schema(example = 340.31)]
    pub overtime_pay: f64,
    #[schema(example = 500.0)]
    pub bonus: f64,
    #[schema(example = 250.0)]
    pub deductions: f64,
    #[schema(example = 8590.31)]
    pub net_salary: f64,
}

pub const SALAIRE_COLUMNS: &str =
    "id, user_id, month, base_salary, overtime_hours, overtime_pay, bonus, deductions, net_salary";
