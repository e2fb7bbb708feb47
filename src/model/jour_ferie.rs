use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

/// A public holiday. Holidays are not working days for leave counting.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct JourFerie {
    pub id: u64,
    #[schema(example = "2026-07-30", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Fete du Trone")]
    pub label: String,
}
