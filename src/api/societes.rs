use crate::{
    api::message,
    auth::auth::AuthUser,
    error::AppError,
    model::{audit::AuditAction, societe::Societe},
    services::audit_log,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const SOCIETE_COLUMNS: &str = "id, name, address, phone, email, created_at";
const UPDATABLE_COLUMNS: &[&str] = &["name", "address", "phone", "email"];

#[derive(Deserialize, ToSchema)]
pub struct CreateSociete {
    #[schema(example = "Atlas Industries")]
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

async fn fetch_societe(pool: &MySqlPool, id: u64) -> Result<Societe, AppError> {
    sqlx::query_as::<_, Societe>(&format!("SELECT {SOCIETE_COLUMNS} FROM societes WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Societe not found"))
}

/// Create a societe
#[utoipa::path(
    post,
    path = "/api/societes",
    request_body = CreateSociete,
    responses(
        (status = 201, description = "Societe created", body = Societe),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Name already used")
    ),
    tag = "Societes",
    security(("bearer_auth" = []))
)]
pub async fn create_societe(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSociete>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }

    let result = sqlx::query("INSERT INTO societes (name, address, phone, email) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(&payload.address)
        .bind(&payload.phone)
        .bind(&payload.email)
        .execute(pool.get_ref())
        .await?;

    let societe = fetch_societe(pool.get_ref(), result.last_insert_id()).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "societes",
        Some(societe.id),
        None,
        serde_json::to_value(&societe).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(societe))
}

/// List societes
#[utoipa::path(
    get,
    path = "/api/societes",
    responses((status = 200, description = "All societes", body = [Societe])),
    tag = "Societes",
    security(("bearer_auth" = []))
)]
pub async fn list_societes(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let societes = sqlx::query_as::<_, Societe>(&format!(
        "SELECT {SOCIETE_COLUMNS} FROM societes ORDER BY name"
    ))
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(societes))
}

/// Get a societe by ID
#[utoipa::path(
    get,
    path = "/api/societes/{societe_id}",
    params(("societe_id" = u64, Path, description = "Societe ID")),
    responses(
        (status = 200, description = "Societe found", body = Societe),
        (status = 404, description = "Societe not found")
    ),
    tag = "Societes",
    security(("bearer_auth" = []))
)]
pub async fn get_societe(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    auth.require_same_societe(id)?;
    let societe = fetch_societe(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(societe))
}

/// Update a societe
#[utoipa::path(
    put,
    path = "/api/societes/{societe_id}",
    params(("societe_id" = u64, Path, description = "Societe ID")),
    request_body(content = Object, description = "Any of name, address, phone, email"),
    responses(
        (status = 200, description = "Societe updated", body = Societe),
        (status = 404, description = "Societe not found")
    ),
    tag = "Societes",
    security(("bearer_auth" = []))
)]
pub async fn update_societe(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();
    let before = fetch_societe(pool.get_ref(), id).await?;

    let update = build_update_sql("societes", &body, UPDATABLE_COLUMNS, "id", id)?;
    execute_update(pool.get_ref(), update).await?;
    let after = fetch_societe(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "societes",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a societe
#[utoipa::path(
    delete,
    path = "/api/societes/{societe_id}",
    params(("societe_id" = u64, Path, description = "Societe ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 400, description = "Societe still has employees"),
        (status = 404, description = "Societe not found")
    ),
    tag = "Societes",
    security(("bearer_auth" = []))
)]
pub async fn delete_societe(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let id = path.into_inner();
    if id == auth.societe_id {
        return Err(AppError::bad_request("You cannot delete your own societe"));
    }
    let societe = fetch_societe(pool.get_ref(), id).await?;

    // users.societe_id has no cascade, so a populated societe fails here
    sqlx::query("DELETE FROM societes WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "societes",
        Some(id),
        serde_json::to_value(&societe).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}
