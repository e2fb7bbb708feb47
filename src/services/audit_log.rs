use serde_json::Value;
use sqlx::MySqlPool;
use tracing::error;

use crate::model::audit::AuditAction;

/// Writes an audit entry. Failures are logged and never reach the caller.
pub async fn record(
    pool: &MySqlPool,
    actor_id: Option<u64>,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<u64>,
    old_values: Option<Value>,
    new_values: Option<Value>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO audits (user_id, action, entity_type, entity_id, old_values, new_values)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(actor_id)
    .bind(action.to_string())
    .bind(entity_type)
    .bind(entity_id)
    .bind(old_values)
    .bind(new_values)
    .execute(pool)
    .await;

    if let Err(e) = result {
        error!(error = %e, %action, entity_type, ?entity_id, "Failed to write audit entry");
    }
}
