use crate::{
    api::{FilterValue, Filters, message, month_range, page_bounds, parse_month, users::visible_user},
    auth::auth::AuthUser,
    error::AppError,
    model::{
        audit::AuditAction,
        pointage::{POINTAGE_COLUMNS, Pointage},
    },
    services::{
        audit_log,
        time_calculation::{DailyHours, MonthlySummary, ShiftPolicy, compute_daily, summarize_month},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Duration, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct ManualPointage {
    pub user_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "08:30:00", value_type = String)]
    pub check_in: NaiveTime,
    #[schema(example = "17:30:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
}

#[derive(Deserialize, ToSchema)]
pub struct PointageUpdate {
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = "08:30:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    /// `null` clears the check-out; omit the field to keep it.
    #[schema(example = "17:30:00", value_type = Option<String>)]
    #[serde(default, deserialize_with = "present_or_null")]
    pub check_out: Option<Option<NaiveTime>>,
}

// Distinguishes a field sent as `null` (Some(None)) from a missing one (None).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<NaiveTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NaiveTime>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PointageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub user_id: Option<u64>,
    /// Inclusive lower bound (YYYY-MM-DD)
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound (YYYY-MM-DD)
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Defaults to the caller
    pub user_id: Option<u64>,
    /// YYYY-MM
    #[param(example = "2026-01")]
    pub month: String,
}

#[derive(Serialize, ToSchema)]
pub struct PointageListResponse {
    pub data: Vec<Pointage>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn now_to_the_second() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();
    let time = now.time().with_nanosecond(0).unwrap_or(now.time());
    (now.date(), time)
}

fn hours_for(check_in: NaiveTime, check_out: Option<NaiveTime>) -> DailyHours {
    check_out
        .map(|out| compute_daily(check_in, out, &ShiftPolicy::default()))
        .unwrap_or_default()
}

async fn fetch_pointage(pool: &MySqlPool, id: u64) -> Result<Pointage, AppError> {
    sqlx::query_as::<_, Pointage>(&format!("SELECT {POINTAGE_COLUMNS} FROM pointages WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Pointage not found"))
}

async fn write_pointage(
    tx: &mut Transaction<'_, MySql>,
    id: u64,
    date: NaiveDate,
    check_in: NaiveTime,
    check_out: Option<NaiveTime>,
) -> Result<(), sqlx::Error> {
    let hours = hours_for(check_in, check_out);
    sqlx::query(
        r#"
        UPDATE pointages
        SET date = ?, check_in = ?, check_out = ?,
            day_hours = ?, night_hours = ?, worked_hours = ?, normal_hours = ?, overtime_hours = ?
        WHERE id = ?
        "#,
    )
    .bind(date)
    .bind(check_in)
    .bind(check_out)
    .bind(hours.day_hours)
    .bind(hours.night_hours)
    .bind(hours.worked_hours)
    .bind(hours.normal_hours)
    .bind(hours.overtime_hours)
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn duplicate_day(e: sqlx::Error) -> AppError {
    match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("A pointage already exists for that day".into()),
        other => other,
    }
}

/// Clock in for today
#[utoipa::path(
    post,
    path = "/api/pointages/check-in",
    responses(
        (status = 201, description = "Checked in", body = Pointage),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "A pointage already exists for that day"
        }))
    ),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let (today, now) = now_to_the_second();

    let result = sqlx::query("INSERT INTO pointages (user_id, date, check_in) VALUES (?, ?, ?)")
        .bind(auth.user_id)
        .bind(today)
        .bind(now)
        .execute(pool.get_ref())
        .await
        .map_err(duplicate_day)?;

    info!(user_id = auth.user_id, %today, check_in = %now, "Checked in");
    let pointage = fetch_pointage(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(pointage))
}

/// Clock out of the open pointage
///
/// Closes the latest open pointage dated today or yesterday, so a night shift
/// started before midnight can be closed the next morning.
#[utoipa::path(
    post,
    path = "/api/pointages/check-out",
    responses(
        (status = 200, description = "Checked out, hours computed", body = Pointage),
        (status = 400, description = "No open pointage", body = Object, example = json!({
            "message": "No open pointage to close"
        }))
    ),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let (today, now) = now_to_the_second();
    let yesterday = today - Duration::days(1);

    let open = sqlx::query_as::<_, Pointage>(&format!(
        r#"
        SELECT {POINTAGE_COLUMNS} FROM pointages
        WHERE user_id = ? AND check_out IS NULL AND date IN (?, ?)
        ORDER BY date DESC
        LIMIT 1
        "#
    ))
    .bind(auth.user_id)
    .bind(today)
    .bind(yesterday)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::bad_request("No open pointage to close"))?;

    // a check-out is at most one rollover after the check-in
    if open.date == yesterday && now >= open.check_in {
        warn!(user_id = auth.user_id, pointage_id = open.id, "Open pointage older than 24h");
        return Err(AppError::bad_request(
            "Open pointage is older than 24 hours, ask HR to correct it",
        ));
    }

    let mut tx = pool.begin().await?;
    write_pointage(&mut tx, open.id, open.date, open.check_in, Some(now)).await?;
    tx.commit().await?;

    let pointage = fetch_pointage(pool.get_ref(), open.id).await?;
    info!(
        user_id = auth.user_id,
        pointage_id = pointage.id,
        worked_hours = pointage.worked_hours,
        overtime_hours = pointage.overtime_hours,
        "Checked out"
    );
    Ok(HttpResponse::Ok().json(pointage))
}

/// Record a pointage on behalf of an employee
#[utoipa::path(
    post,
    path = "/api/pointages",
    request_body = ManualPointage,
    responses(
        (status = 201, description = "Pointage created", body = Pointage),
        (status = 409, description = "A pointage already exists for that day")
    ),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn create_pointage(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ManualPointage>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    visible_user(pool.get_ref(), &auth, payload.user_id).await?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query("INSERT INTO pointages (user_id, date, check_in) VALUES (?, ?, ?)")
        .bind(payload.user_id)
        .bind(payload.date)
        .bind(payload.check_in)
        .execute(&mut *tx)
        .await
        .map_err(duplicate_day)?;
    let id = result.last_insert_id();
    write_pointage(&mut tx, id, payload.date, payload.check_in, payload.check_out).await?;
    tx.commit().await?;

    let pointage = fetch_pointage(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "pointages",
        Some(id),
        None,
        serde_json::to_value(&pointage).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(pointage))
}

/// Correct a pointage; hours are recomputed
#[utoipa::path(
    put,
    path = "/api/pointages/{pointage_id}",
    params(("pointage_id" = u64, Path, description = "Pointage ID")),
    request_body = PointageUpdate,
    responses(
        (status = 200, description = "Pointage updated", body = Pointage),
        (status = 404, description = "Pointage not found")
    ),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn update_pointage(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PointageUpdate>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let before = fetch_pointage(pool.get_ref(), id).await?;
    visible_user(pool.get_ref(), &auth, before.user_id).await?;

    let date = payload.date.unwrap_or(before.date);
    let check_in = payload.check_in.unwrap_or(before.check_in);
    let check_out = payload.check_out.unwrap_or(before.check_out);

    let mut tx = pool.begin().await?;
    write_pointage(&mut tx, id, date, check_in, check_out)
        .await
        .map_err(duplicate_day)?;
    tx.commit().await?;

    let after = fetch_pointage(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "pointages",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a pointage
#[utoipa::path(
    delete,
    path = "/api/pointages/{pointage_id}",
    params(("pointage_id" = u64, Path, description = "Pointage ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Pointage not found")
    ),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn delete_pointage(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let pointage = fetch_pointage(pool.get_ref(), id).await?;
    visible_user(pool.get_ref(), &auth, pointage.user_id).await?;

    sqlx::query("DELETE FROM pointages WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "pointages",
        Some(id),
        serde_json::to_value(&pointage).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}

/// List pointages
///
/// HR and admins see every pointage of their societe; other users only
/// their own.
#[utoipa::path(
    get,
    path = "/api/pointages",
    params(PointageQuery),
    responses((status = 200, description = "Paginated pointages", body = PointageListResponse)),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn list_pointages(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PointageQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 31);

    let user_filter = if auth.is_hr_or_admin() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let mut filters = Filters::new();
    filters
        .push_opt_u64("p.user_id = ?", user_filter)
        .push_opt_u64("u.societe_id = ?", auth.societe_scope());
    if let Some(from) = query.from {
        filters.push("p.date >= ?", FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        filters.push("p.date <= ?", FilterValue::Date(to));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!(
        "SELECT COUNT(*) FROM pointages p JOIN users u ON u.id = p.user_id{}",
        where_clause
    );
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT p.id, p.user_id, p.date, p.check_in, p.check_out, p.day_hours, p.night_hours, \
         p.worked_hours, p.normal_hours, p.overtime_hours \
         FROM pointages p JOIN users u ON u.id = p.user_id{} \
         ORDER BY p.date DESC, p.id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Pointage>(&data_sql))
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PointageListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Pointages of one user in `[start, end)`.
pub(crate) async fn pointages_in_range(
    pool: &MySqlPool,
    user_id: u64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Pointage>, sqlx::Error> {
    sqlx::query_as::<_, Pointage>(&format!(
        "SELECT {POINTAGE_COLUMNS} FROM pointages WHERE user_id = ? AND date >= ? AND date < ? ORDER BY date"
    ))
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Loads and totals one user's month.
pub(crate) async fn monthly_summary(
    pool: &MySqlPool,
    user_id: u64,
    month: NaiveDate,
) -> Result<MonthlySummary, sqlx::Error> {
    let (start, end) = month_range(month);
    let pointages = pointages_in_range(pool, user_id, start, end).await?;
    Ok(summarize_month(user_id, start, &pointages, &ShiftPolicy::default()))
}

/// Monthly totals of worked, normal, overtime and night hours
#[utoipa::path(
    get,
    path = "/api/pointages/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Monthly summary", body = MonthlySummary),
        (status = 400, description = "Invalid month")
    ),
    tag = "Pointages",
    security(("bearer_auth" = []))
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    let month = parse_month(&query.month)?;
    let user_id = query.user_id.unwrap_or(auth.user_id);
    auth.require_self_or_hr(user_id)?;
    visible_user(pool.get_ref(), &auth, user_id).await?;

    let summary = monthly_summary(pool.get_ref(), user_id, month).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_out_can_be_kept_replaced_or_cleared() {
        let kept: PointageUpdate = serde_json::from_str(r#"{"check_in": "08:00:00"}"#).unwrap();
        assert_eq!(kept.check_out, None);

        let replaced: PointageUpdate = serde_json::from_str(r#"{"check_out": "17:00:00"}"#).unwrap();
        assert_eq!(replaced.check_out, Some(NaiveTime::from_hms_opt(17, 0, 0)));

        let cleared: PointageUpdate = serde_json::from_str(r#"{"check_out": null}"#).unwrap();
        assert_eq!(cleared.check_out, Some(None));
    }
}
