use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Departement {
    pub id: u64,
    pub societe_id: u64,
    #[schema(example = "Production")]
    pub name: String,
    pub manager_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}
