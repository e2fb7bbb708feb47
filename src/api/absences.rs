use std::str::FromStr;

use crate::{
    api::{FilterValue, Filters, page_bounds, users::visible_user},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{
        absence_request::{ABSENCE_COLUMNS, AbsenceRequest, AbsenceStatus, AbsenceType},
        audit::AuditAction,
    },
    services::{
        audit_log,
        leave_balance::{check_range, load_balance, working_days},
        notifier::{NotificationQueue, absence_reviewed_message},
    },
    utils::holiday_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateAbsence {
    #[schema(example = "conge")]
    pub absence_type: AbsenceType,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-06", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AbsenceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Ignored for non-HR callers
    pub user_id: Option<u64>,
    #[param(example = "pending")]
    pub status: Option<String>,
    #[param(example = "conge")]
    pub absence_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AbsenceListResponse {
    pub data: Vec<AbsenceRequest>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn fetch_absence(pool: &MySqlPool, id: u64) -> Result<AbsenceRequest, AppError> {
    sqlx::query_as::<_, AbsenceRequest>(&format!(
        "SELECT {ABSENCE_COLUMNS} FROM absence_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Absence request not found"))
}

fn status_of(request: &AbsenceRequest) -> Result<AbsenceStatus, AppError> {
    AbsenceStatus::from_str(&request.status)
        .map_err(|_| AppError::Internal(format!("Unknown absence status '{}'", request.status)))
}

/// Request an absence
///
/// The number of days is the count of working days in the range (weekends
/// and public holidays excluded). Conge requests must fit in the available
/// balance minus what is already pending.
#[utoipa::path(
    post,
    path = "/api/absences",
    request_body = CreateAbsence,
    responses(
        (status = 201, description = "Request submitted", body = AbsenceRequest),
        (status = 400, description = "Invalid range or insufficient balance"),
        (status = 409, description = "Overlaps another request")
    ),
    tag = "Absences",
    security(("bearer_auth" = []))
)]
pub async fn create_absence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateAbsence>,
) -> Result<HttpResponse, AppError> {
    check_range(payload.start_date, payload.end_date).map_err(|e| AppError::bad_request(e.to_string()))?;
    let holidays = holiday_cache::holidays_between(pool.get_ref(), payload.start_date, payload.end_date).await?;
    let days = working_days(payload.start_date, payload.end_date, &config.weekend_days, &holidays)
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    if days == 0 {
        return Err(AppError::bad_request("The requested range has no working day"));
    }
    let days = f64::from(days);

    let overlapping = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM absence_requests
        WHERE user_id = ?
        AND status IN ('pending', 'approved')
        AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.end_date)
    .bind(payload.start_date)
    .fetch_one(pool.get_ref())
    .await?;
    if overlapping > 0 {
        return Err(AppError::Conflict(
            "The range overlaps another pending or approved request".to_string(),
        ));
    }

    if payload.absence_type.consumes_leave_balance() {
        let balance = load_balance(
            pool.get_ref(),
            auth.user_id,
            Local::now().date_naive(),
            config.leave_days_per_month,
        )
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

        if !balance.can_request(days) {
            return Err(AppError::bad_request(format!(
                "Insufficient leave balance: {days} requested, {} available, {} pending",
                balance.available, balance.pending
            )));
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO absence_requests (user_id, absence_type, start_date, end_date, days, reason)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.absence_type.to_string())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(days)
    .bind(&payload.reason)
    .execute(pool.get_ref())
    .await?;

    let request = fetch_absence(pool.get_ref(), result.last_insert_id()).await?;
    info!(user_id = auth.user_id, absence_id = request.id, days, "Absence requested");

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "absence_requests",
        Some(request.id),
        None,
        serde_json::to_value(&request).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(request))
}

/// List absence requests
#[utoipa::path(
    get,
    path = "/api/absences",
    params(AbsenceQuery),
    responses((status = 200, description = "Paginated absence requests", body = AbsenceListResponse)),
    tag = "Absences",
    security(("bearer_auth" = []))
)]
pub async fn list_absences(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AbsenceQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let user_filter = if auth.is_hr_or_admin() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let mut filters = Filters::new();
    filters
        .push_opt_u64("a.user_id = ?", user_filter)
        .push_opt_u64("u.societe_id = ?", auth.societe_scope());

    if let Some(status) = &query.status {
        let status = AbsenceStatus::from_str(status)
            .map_err(|_| AppError::bad_request(format!("Unknown status '{status}'")))?;
        filters.push("a.status = ?", FilterValue::Str(status.to_string()));
    }
    if let Some(kind) = &query.absence_type {
        let kind = AbsenceType::from_str(kind)
            .map_err(|_| AppError::bad_request(format!("Unknown absence type '{kind}'")))?;
        filters.push("a.absence_type = ?", FilterValue::Str(kind.to_string()));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!(
        "SELECT COUNT(*) FROM absence_requests a JOIN users u ON u.id = a.user_id{}",
        where_clause
    );
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT a.id, a.user_id, a.absence_type, a.start_date, a.end_date, a.days, a.reason, \
         a.status, a.reviewed_by, a.created_at \
         FROM absence_requests a JOIN users u ON u.id = a.user_id{} \
         ORDER BY a.created_at DESC, a.id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, AbsenceRequest>(&data_sql))
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AbsenceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get an absence request
#[utoipa::path(
    get,
    path = "/api/absences/{absence_id}",
    params(("absence_id" = u64, Path, description = "Absence request ID")),
    responses(
        (status = 200, description = "Absence request", body = AbsenceRequest),
        (status = 404, description = "Not found")
    ),
    tag = "Absences",
    security(("bearer_auth" = []))
)]
pub async fn get_absence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = fetch_absence(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(request.user_id)?;
    visible_user(pool.get_ref(), &auth, request.user_id).await?;
    Ok(HttpResponse::Ok().json(request))
}

async fn review(
    auth: AuthUser,
    pool: &MySqlPool,
    queue: &NotificationQueue,
    id: u64,
    decision: AbsenceStatus,
) -> Result<AbsenceRequest, AppError> {
    auth.require_hr_or_admin()?;
    let before = fetch_absence(pool, id).await?;
    let requester = visible_user(pool, &auth, before.user_id).await?;

    if status_of(&before)? != AbsenceStatus::Pending {
        return Err(AppError::bad_request("Only pending requests can be reviewed"));
    }

    // guarded on status so two reviewers cannot both win
    let result = sqlx::query(
        r#"
        UPDATE absence_requests
        SET status = ?, reviewed_by = ?, reviewed_at = NOW()
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(decision.to_string())
    .bind(auth.user_id)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Request was reviewed concurrently".to_string()));
    }

    let after = fetch_absence(pool, id).await?;
    info!(absence_id = id, reviewer = auth.user_id, status = %decision, "Absence reviewed");

    queue.enqueue(
        requester.phone.as_deref(),
        absence_reviewed_message(
            decision == AbsenceStatus::Approved,
            after.start_date,
            after.end_date,
        ),
    );

    let action = if decision == AbsenceStatus::Approved {
        AuditAction::Approve
    } else {
        AuditAction::Reject
    };
    audit_log::record(
        pool,
        Some(auth.user_id),
        action,
        "absence_requests",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(after)
}

/// Approve a pending absence request
#[utoipa::path(
    put,
    path = "/api/absences/{absence_id}/approve",
    params(("absence_id" = u64, Path, description = "Absence request ID")),
    responses(
        (status = 200, description = "Approved; the requester is notified", body = AbsenceRequest),
        (status = 400, description = "Request is not pending")
    ),
    tag = "Absences",
    security(("bearer_auth" = []))
)]
pub async fn approve_absence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    queue: web::Data<NotificationQueue>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = review(auth, pool.get_ref(), queue.get_ref(), path.into_inner(), AbsenceStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Reject a pending absence request
#[utoipa::path(
    put,
    path = "/api/absences/{absence_id}/reject",
    params(("absence_id" = u64, Path, description = "Absence request ID")),
    responses(
        (status = 200, description = "Rejected; the requester is notified", body = AbsenceRequest),
        (status = 400, description = "Request is not pending")
    ),
    tag = "Absences",
    security(("bearer_auth" = []))
)]
pub async fn reject_absence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    queue: web::Data<NotificationQueue>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = review(auth, pool.get_ref(), queue.get_ref(), path.into_inner(), AbsenceStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Cancel one of your own pending requests
#[utoipa::path(
    put,
    path = "/api/absences/{absence_id}/cancel",
    params(("absence_id" = u64, Path, description = "Absence request ID")),
    responses(
        (status = 200, description = "Cancelled", body = AbsenceRequest),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Not the requester")
    ),
    tag = "Absences",
    security(("bearer_auth" = []))
)]
pub async fn cancel_absence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let before = fetch_absence(pool.get_ref(), id).await?;
    if before.user_id != auth.user_id {
        return Err(AppError::forbidden("Only the requester can cancel"));
    }

    let result = sqlx::query(
        "UPDATE absence_requests SET status = 'cancelled' WHERE id = ? AND status = 'pending'",
    )
    .bind(id)
    .execute(pool.get_ref())
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::bad_request("Only pending requests can be cancelled"));
    }

    let after = fetch_absence(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Cancel,
        "absence_requests",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}
