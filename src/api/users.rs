use crate::{
    api::{
        FilterValue, Filters, departements::departement_in_societe, message, optional_id,
        page_bounds, require_same_tenant,
    },
    auth::{auth::AuthUser, password::hash_password},
    config::Config,
    error::AppError,
    model::{
        audit::AuditAction,
        role::Role,
        user::{USER_COLUMNS, User},
    },
    services::{
        audit_log,
        leave_balance::{LeaveBalance, load_balance},
    },
    utils::{
        db_utils::{build_update_sql, execute_update},
        email_filter,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns HR may change through `PUT /users/{id}`.
const UPDATABLE_COLUMNS: &[&str] = &[
    "matricule",
    "first_name",
    "last_name",
    "email",
    "phone",
    "role_id",
    "departement_id",
    "position",
    "hire_date",
    "base_salary",
    "initial_leave_balance",
    "is_active",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "EMP-001")]
    pub matricule: String,
    #[schema(example = "Amina")]
    pub first_name: String,
    #[schema(example = "Benali")]
    pub last_name: String,
    #[schema(example = "amina.benali@company.ma", format = "email")]
    pub email: String,
    #[schema(example = "0612345678")]
    pub phone: Option<String>,
    #[schema(example = "change-me")]
    pub password: String,
    #[schema(example = 4)]
    pub role_id: u8,
    /// Defaults to the creator's societe.
    #[schema(example = 1)]
    pub societe_id: Option<u64>,
    #[schema(example = 2)]
    pub departement_id: Option<u64>,
    #[schema(example = "Technician")]
    pub position: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(example = 8000.0)]
    pub base_salary: f64,
    #[schema(example = 0.0)]
    pub initial_leave_balance: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub departement_id: Option<u64>,
    pub role_id: Option<u8>,
    pub is_active: Option<bool>,
    /// Search by name, email or matricule
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub data: Vec<User>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

async fn fetch_user(pool: &MySqlPool, user_id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Loads a user the caller is allowed to see.
pub(crate) async fn visible_user(
    pool: &MySqlPool,
    auth: &AuthUser,
    user_id: u64,
) -> Result<User, AppError> {
    let user = fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    auth.require_same_societe(user.societe_id)?;
    Ok(user)
}

/// Fails unless user `user_id` exists and belongs to `societe_id`.
pub(crate) async fn user_in_societe(
    pool: &MySqlPool,
    user_id: u64,
    societe_id: u64,
) -> Result<User, AppError> {
    let user = fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Referenced user does not exist"))?;
    require_same_tenant(user.societe_id, societe_id, "User")?;
    Ok(user)
}

/// Create an employee account
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("A valid email is required"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::bad_request("Password must be at least 6 characters"));
    }
    let role = Role::from_id(payload.role_id)
        .ok_or_else(|| AppError::bad_request("Unknown role_id"))?;
    if role == Role::Admin && !auth.is_admin() {
        return Err(AppError::forbidden("Only an admin can create admins"));
    }
    if payload.base_salary < 0.0 {
        return Err(AppError::bad_request("base_salary cannot be negative"));
    }

    let societe_id = payload.societe_id.unwrap_or(auth.societe_id);
    auth.require_same_societe(societe_id)?;
    if let Some(departement_id) = payload.departement_id {
        departement_in_societe(pool.get_ref(), departement_id, societe_id).await?;
    }

    if !email_filter::is_email_available(&email, pool.get_ref()).await? {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO users
            (matricule, first_name, last_name, email, phone, password, role_id, societe_id,
             departement_id, position, hire_date, base_salary, initial_leave_balance)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.matricule.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&email)
    .bind(&payload.phone)
    .bind(hashed)
    .bind(role.id())
    .bind(societe_id)
    .bind(payload.departement_id)
    .bind(&payload.position)
    .bind(payload.hire_date)
    .bind(payload.base_salary)
    .bind(payload.initial_leave_balance.unwrap_or(0.0))
    .execute(pool.get_ref())
    .await?;

    let user_id = result.last_insert_id();
    email_filter::insert(&email);
    info!(user_id, created_by = auth.user_id, "User created");

    let user = fetch_user(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::Internal("Created user vanished".to_string()))?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "users",
        Some(user_id),
        None,
        serde_json::to_value(&user).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(user))
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses((status = 200, description = "Paginated user list", body = UserListResponse)),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut filters = Filters::new();
    filters
        .push_opt_u64("societe_id = ?", auth.societe_scope())
        .push_opt_u64("departement_id = ?", query.departement_id)
        .push_opt_u64("role_id = ?", query.role_id.map(u64::from));

    if let Some(active) = query.is_active {
        filters.push("is_active = ?", FilterValue::U64(active as u64));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let like = format!("%{}%", search.trim());
        filters.push_all(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR matricule LIKE ?)",
            std::iter::repeat(FilterValue::Str(like)).take(4),
        );
    }

    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM users{}", where_clause);
    debug!(sql = %count_sql, "Counting users");
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {USER_COLUMNS} FROM users{} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let users = filters
        .bind_as(sqlx::query_as::<_, User>(&data_sql))
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        data: users,
        page,
        per_page,
        total,
    }))
}

/// Get an employee by ID
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let user = visible_user(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Trims and lowercases `email` in a partial-update body, as on create.
fn normalize_email_field(body: &mut Value) -> Result<(), AppError> {
    match body.get_mut("email") {
        None => Ok(()),
        Some(Value::String(email)) => {
            let normalized = email.trim().to_lowercase();
            if normalized.is_empty() || !normalized.contains('@') {
                return Err(AppError::bad_request("A valid email is required"));
            }
            *email = normalized;
            Ok(())
        }
        Some(_) => Err(AppError::bad_request("A valid email is required")),
    }
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses((status = 200, description = "Own profile", body = User)),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let user = fetch_user(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Update an employee
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    request_body(content = Object, description = "Any subset of the updatable user columns"),
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let user_id = path.into_inner();
    let before = visible_user(pool.get_ref(), &auth, user_id).await?;
    auth.require_can_manage_account(before.role_id)?;

    let mut body = body.into_inner();
    normalize_email_field(&mut body)?;

    if let Some(departement_id) = optional_id(&body, "departement_id")? {
        departement_in_societe(pool.get_ref(), departement_id, before.societe_id).await?;
    }

    if let Some(role_id) = body.get("role_id") {
        let role = role_id
            .as_u64()
            .and_then(|r| u8::try_from(r).ok())
            .and_then(Role::from_id)
            .ok_or_else(|| AppError::bad_request("Unknown role_id"))?;
        if role == Role::Admin && !auth.is_admin() {
            return Err(AppError::forbidden("Only an admin can grant admin"));
        }
    }

    let update = build_update_sql("users", &body, UPDATABLE_COLUMNS, "id", user_id)?;
    execute_update(pool.get_ref(), update).await?;

    let after = fetch_user(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if before.email != after.email {
        email_filter::remove(&before.email);
        email_filter::insert(&after.email);
    }

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "users",
        Some(user_id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete an employee
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let user_id = path.into_inner();
    if user_id == auth.user_id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }
    let user = visible_user(pool.get_ref(), &auth, user_id).await?;
    auth.require_can_manage_account(user.role_id)?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    email_filter::remove(&user.email);

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "users",
        Some(user_id),
        serde_json::to_value(&user).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}

#[derive(Serialize, ToSchema)]
pub struct LeaveBalanceResponse {
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub as_of: NaiveDate,
    pub balance: LeaveBalance,
}

/// Paid-leave balance of an employee
#[utoipa::path(
    get,
    path = "/api/users/{user_id}/leave-balance",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Current balance", body = LeaveBalanceResponse),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn leave_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    auth.require_self_or_hr(user_id)?;
    visible_user(pool.get_ref(), &auth, user_id).await?;

    let as_of = Local::now().date_naive();
    let balance = load_balance(pool.get_ref(), user_id, as_of, config.leave_days_per_month)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(LeaveBalanceResponse {
        user_id,
        as_of,
        balance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn updated_email_is_normalized_like_on_create() {
        let mut body = json!({ "email": "  Amina.Benali@Company.MA ", "phone": "0612" });
        normalize_email_field(&mut body).unwrap();
        assert_eq!(body["email"], "amina.benali@company.ma");
        assert_eq!(body["phone"], "0612");
    }

    #[test]
    fn invalid_updated_email_is_rejected() {
        assert!(normalize_email_field(&mut json!({ "email": "   " })).is_err());
        assert!(normalize_email_field(&mut json!({ "email": "no-at-sign" })).is_err());
        assert!(normalize_email_field(&mut json!({ "email": 42 })).is_err());
        assert!(normalize_email_field(&mut json!({ "first_name": "Amina" })).is_ok());
    }
}
