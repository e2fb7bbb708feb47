use crate::{
    api::{Filters, message, optional_id, require_same_tenant, users::user_in_societe},
    auth::auth::AuthUser,
    error::AppError,
    model::{audit::AuditAction, departement::Departement},
    services::audit_log,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const DEPARTEMENT_COLUMNS: &str = "id, societe_id, name, manager_id, created_at";
const UPDATABLE_COLUMNS: &[&str] = &["name", "manager_id"];

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartement {
    #[schema(example = "Production")]
    pub name: String,
    /// Defaults to the creator's societe; only admins may pick another.
    pub societe_id: Option<u64>,
    pub manager_id: Option<u64>,
}

/// Fails unless departement `id` exists and belongs to `societe_id`.
pub(crate) async fn departement_in_societe(
    pool: &MySqlPool,
    id: u64,
    societe_id: u64,
) -> Result<Departement, AppError> {
    let departement = fetch_departement(pool, id).await?;
    require_same_tenant(departement.societe_id, societe_id, "Departement")?;
    Ok(departement)
}

async fn fetch_departement(pool: &MySqlPool, id: u64) -> Result<Departement, AppError> {
    sqlx::query_as::<_, Departement>(&format!(
        "SELECT {DEPARTEMENT_COLUMNS} FROM departements WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Departement not found"))
}

/// Create a departement
#[utoipa::path(
    post,
    path = "/api/departements",
    request_body = CreateDepartement,
    responses(
        (status = 201, description = "Departement created", body = Departement),
        (status = 409, description = "Name already used in this societe")
    ),
    tag = "Departements",
    security(("bearer_auth" = []))
)]
pub async fn create_departement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartement>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    let societe_id = payload.societe_id.unwrap_or(auth.societe_id);
    auth.require_same_societe(societe_id)?;
    if let Some(manager_id) = payload.manager_id {
        user_in_societe(pool.get_ref(), manager_id, societe_id).await?;
    }

    let result = sqlx::query(
        "INSERT INTO departements (societe_id, name, manager_id) VALUES (?, ?, ?)",
    )
    .bind(societe_id)
    .bind(name)
    .bind(payload.manager_id)
    .execute(pool.get_ref())
    .await?;

    let departement = fetch_departement(pool.get_ref(), result.last_insert_id()).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "departements",
        Some(departement.id),
        None,
        serde_json::to_value(&departement).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(departement))
}

/// List departements
#[utoipa::path(
    get,
    path = "/api/departements",
    responses((status = 200, description = "Departements of the caller's societe", body = [Departement])),
    tag = "Departements",
    security(("bearer_auth" = []))
)]
pub async fn list_departements(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let mut filters = Filters::new();
    filters.push_opt_u64("societe_id = ?", auth.societe_scope());

    let sql = format!(
        "SELECT {DEPARTEMENT_COLUMNS} FROM departements{} ORDER BY name",
        filters.where_clause()
    );
    let departements = filters
        .bind_as(sqlx::query_as::<_, Departement>(&sql))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(departements))
}

/// Get a departement by ID
#[utoipa::path(
    get,
    path = "/api/departements/{departement_id}",
    params(("departement_id" = u64, Path, description = "Departement ID")),
    responses(
        (status = 200, description = "Departement found", body = Departement),
        (status = 404, description = "Departement not found")
    ),
    tag = "Departements",
    security(("bearer_auth" = []))
)]
pub async fn get_departement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let departement = fetch_departement(pool.get_ref(), path.into_inner()).await?;
    auth.require_same_societe(departement.societe_id)?;
    Ok(HttpResponse::Ok().json(departement))
}

/// Update a departement
#[utoipa::path(
    put,
    path = "/api/departements/{departement_id}",
    params(("departement_id" = u64, Path, description = "Departement ID")),
    request_body(content = Object, description = "`name` and/or `manager_id`"),
    responses(
        (status = 200, description = "Departement updated", body = Departement),
        (status = 404, description = "Departement not found")
    ),
    tag = "Departements",
    security(("bearer_auth" = []))
)]
pub async fn update_departement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let before = fetch_departement(pool.get_ref(), id).await?;
    auth.require_same_societe(before.societe_id)?;
    if let Some(manager_id) = optional_id(&body, "manager_id")? {
        user_in_societe(pool.get_ref(), manager_id, before.societe_id).await?;
    }

    let update = build_update_sql("departements", &body, UPDATABLE_COLUMNS, "id", id)?;
    execute_update(pool.get_ref(), update).await?;
    let after = fetch_departement(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "departements",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a departement. Its members keep their account with no departement.
#[utoipa::path(
    delete,
    path = "/api/departements/{departement_id}",
    params(("departement_id" = u64, Path, description = "Departement ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Departement not found")
    ),
    tag = "Departements",
    security(("bearer_auth" = []))
)]
pub async fn delete_departement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let departement = fetch_departement(pool.get_ref(), id).await?;
    auth.require_same_societe(departement.societe_id)?;

    sqlx::query("DELETE FROM departements WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "departements",
        Some(id),
        serde_json::to_value(&departement).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}
