use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Approve,
    Reject,
    Cancel,
    Login,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Audit {
    pub id: u64,
    pub user_id: Option<u64>,
    #[schema(example = "update")]
    pub action: String,
    #[schema(example = "users")]
    pub entity_type: String,
    pub entity_id: Option<u64>,
    #[schema(value_type = Object)]
    pub old_values: Option<Value>,
    #[schema(value_type = Object)]
    pub new_values: Option<Value>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}
