use std::str::FromStr;

use crate::{
    api::{FilterValue, Filters, page_bounds},
    auth::auth::AuthUser,
    error::AppError,
    model::audit::{Audit, AuditAction},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Actor
    pub user_id: Option<u64>,
    #[param(example = "update")]
    pub action: Option<String>,
    #[param(example = "users")]
    pub entity_type: Option<String>,
    pub entity_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct AuditListResponse {
    pub data: Vec<Audit>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Browse the audit trail (Admin only)
#[utoipa::path(
    get,
    path = "/api/audits",
    params(AuditQuery),
    responses(
        (status = 200, description = "Paginated audit entries, newest first", body = AuditListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Audits",
    security(("bearer_auth" = []))
)]
pub async fn list_audits(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 50);

    let mut filters = Filters::new();
    filters
        .push_opt_u64("user_id = ?", query.user_id)
        .push_opt_u64("entity_id = ?", query.entity_id);

    if let Some(action) = &query.action {
        let action = AuditAction::from_str(action)
            .map_err(|_| AppError::bad_request(format!("Unknown action '{action}'")))?;
        filters.push("action = ?", FilterValue::Str(action.to_string()));
    }
    if let Some(entity_type) = &query.entity_type {
        filters.push("entity_type = ?", FilterValue::Str(entity_type.clone()));
    }
    if let Some(from) = query.from {
        filters.push("created_at >= ?", FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        filters.push("DATE(created_at) <= ?", FilterValue::Date(to));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM audits{}", where_clause);
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT id, user_id, action, entity_type, entity_id, old_values, new_values, created_at \
         FROM audits{} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Audit>(&data_sql))
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AuditListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
