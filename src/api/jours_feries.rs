use crate::{
    api::message,
    auth::auth::AuthUser,
    error::AppError,
    model::{audit::AuditAction, jour_ferie::JourFerie},
    services::audit_log,
    utils::holiday_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct JourFerieInput {
    #[schema(example = "2026-07-30", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Fete du Trone")]
    pub label: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct JourFerieQuery {
    /// Only holidays of this year
    pub year: Option<i32>,
}

async fn fetch_jour_ferie(pool: &MySqlPool, id: u64) -> Result<JourFerie, AppError> {
    sqlx::query_as::<_, JourFerie>("SELECT id, date, label FROM jours_feries WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Holiday not found"))
}

fn validate(input: &JourFerieInput) -> Result<&str, AppError> {
    let label = input.label.trim();
    if label.is_empty() {
        return Err(AppError::bad_request("Label is required"));
    }
    Ok(label)
}

/// Declare a public holiday
#[utoipa::path(
    post,
    path = "/api/jours-feries",
    request_body = JourFerieInput,
    responses(
        (status = 201, description = "Holiday created", body = JourFerie),
        (status = 409, description = "A holiday already exists on that date")
    ),
    tag = "Jours feries",
    security(("bearer_auth" = []))
)]
pub async fn create_jour_ferie(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<JourFerieInput>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let label = validate(&payload)?;

    let result = sqlx::query("INSERT INTO jours_feries (date, label) VALUES (?, ?)")
        .bind(payload.date)
        .bind(label)
        .execute(pool.get_ref())
        .await?;

    holiday_cache::invalidate(payload.date.year()).await;
    let jour = fetch_jour_ferie(pool.get_ref(), result.last_insert_id()).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "jours_feries",
        Some(jour.id),
        None,
        serde_json::to_value(&jour).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(jour))
}

/// List public holidays
#[utoipa::path(
    get,
    path = "/api/jours-feries",
    params(JourFerieQuery),
    responses((status = 200, description = "Holidays ordered by date", body = [JourFerie])),
    tag = "Jours feries",
    security(("bearer_auth" = []))
)]
pub async fn list_jours_feries(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<JourFerieQuery>,
) -> Result<HttpResponse, AppError> {
    let jours = match query.year {
        Some(year) => {
            sqlx::query_as::<_, JourFerie>(
                "SELECT id, date, label FROM jours_feries WHERE YEAR(date) = ? ORDER BY date",
            )
            .bind(year)
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, JourFerie>("SELECT id, date, label FROM jours_feries ORDER BY date")
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(jours))
}

/// Update a public holiday
#[utoipa::path(
    put,
    path = "/api/jours-feries/{jour_id}",
    params(("jour_id" = u64, Path, description = "Holiday ID")),
    request_body = JourFerieInput,
    responses(
        (status = 200, description = "Holiday updated", body = JourFerie),
        (status = 404, description = "Holiday not found")
    ),
    tag = "Jours feries",
    security(("bearer_auth" = []))
)]
pub async fn update_jour_ferie(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<JourFerieInput>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let label = validate(&payload)?;
    let before = fetch_jour_ferie(pool.get_ref(), id).await?;

    sqlx::query("UPDATE jours_feries SET date = ?, label = ? WHERE id = ?")
        .bind(payload.date)
        .bind(label)
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    holiday_cache::invalidate(before.date.year()).await;
    holiday_cache::invalidate(payload.date.year()).await;
    let after = fetch_jour_ferie(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "jours_feries",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a public holiday
#[utoipa::path(
    delete,
    path = "/api/jours-feries/{jour_id}",
    params(("jour_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Holiday not found")
    ),
    tag = "Jours feries",
    security(("bearer_auth" = []))
)]
pub async fn delete_jour_ferie(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let jour = fetch_jour_ferie(pool.get_ref(), id).await?;

    sqlx::query("DELETE FROM jours_feries WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    holiday_cache::invalidate(jour.date.year()).await;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "jours_feries",
        Some(id),
        serde_json::to_value(&jour).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}
