use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A publication with its aggregated votes.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Publication {
    pub id: u64,
    pub author_id: u64,
    pub societe_id: u64,
    pub title: String,
    pub content: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

pub const PUBLICATION_SELECT: &str = r#"
    SELECT p.id, p.author_id, p.societe_id, p.title, p.content, p.created_at,
        CAST(COALESCE(SUM(v.value = 1), 0) AS SIGNED) AS upvotes,
        CAST(COALESCE(SUM(v.value = -1), 0) AS SIGNED) AS downvotes,
        CAST(COALESCE(SUM(v.value), 0) AS SIGNED) AS score
    FROM publications p
    LEFT JOIN votes v ON v.publication_id = p.id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(VoteValue::Up),
            -1 => Some(VoteValue::Down),
            _ => None,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}
