use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

/// A daily clock-in/clock-out record. A check-out earlier than the
/// check-in belongs to the following day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Pointage {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "08:30:00", value_type = String)]
    pub check_in: NaiveTime,
    #[schema(example = "17:30:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    pub day_hours: f64,
    pub night_hours: f64,
    pub worked_hours: f64,
    pub normal_hours: f64,
    pub overtime_hours: f64,
}

pub const POINTAGE_COLUMNS: &str = "id, user_id, date, check_in, check_out, day_hours, \
     night_hours, worked_hours, normal_hours, overtime_hours";
