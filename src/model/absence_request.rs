use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbsenceType {
    /// Paid leave, deducted from the leave balance.
    Conge,
    Maladie,
    SansSolde,
    Autre,
}

impl AbsenceType {
    pub fn consumes_leave_balance(self) -> bool {
        self == AbsenceType::Conge
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AbsenceStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AbsenceRequest {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "conge")]
    pub absence_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    /// Working days covered by the request.
    pub days: f64,
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

pub const ABSENCE_COLUMNS: &str =
    "id, user_id, absence_type, start_date, end_date, days, reason, status, reviewed_by, created_at";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn types_use_snake_case_names() {
        assert_eq!(AbsenceType::SansSolde.to_string(), "sans_solde");
        assert_eq!(AbsenceType::from_str("conge").unwrap(), AbsenceType::Conge);
        assert!(AbsenceType::from_str("vacation").is_err());
        assert!(AbsenceType::Conge.consumes_leave_balance());
        assert!(!AbsenceType::Maladie.consumes_leave_balance());
    }
}
