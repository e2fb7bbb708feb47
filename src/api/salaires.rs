use crate::{
    api::{FilterValue, Filters, page_bounds, parse_month, pointages::monthly_summary, users::visible_user},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{
        audit::AuditAction,
        salaire::{SALAIRE_COLUMNS, Salaire},
    },
    services::{
        audit_log,
        payroll::{PayPolicy, SalaryBreakdown, compute_salary},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct GenerateSalaire {
    pub user_id: u64,
    #[schema(example = "2026-01")]
    pub month: String,
    #[schema(example = 500.0)]
    pub bonus: Option<f64>,
    #[schema(example = 250.0)]
    pub deductions: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct SalaireUpdate {
    pub base_salary: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub bonus: Option<f64>,
    pub deductions: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SalaireQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub user_id: Option<u64>,
    /// YYYY-MM
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SalaireListResponse {
    pub data: Vec<Salaire>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct SalaireResponse {
    pub salaire: Salaire,
    pub breakdown: SalaryBreakdown,
}

fn pay_policy(config: &Config) -> PayPolicy {
    PayPolicy {
        monthly_hours: config.payroll_monthly_hours,
        overtime_rate: config.overtime_rate,
    }
}

fn check_amounts(values: &[Option<f64>]) -> Result<(), AppError> {
    if values.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(AppError::bad_request("Amounts and hours must be non-negative"));
    }
    Ok(())
}

async fn fetch_salaire(pool: &MySqlPool, id: u64) -> Result<Salaire, AppError> {
    sqlx::query_as::<_, Salaire>(&format!("SELECT {SALAIRE_COLUMNS} FROM salaires WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Salaire not found"))
}

/// Compute and store a monthly salary
///
/// Overtime hours come from the employee's pointages of that month.
#[utoipa::path(
    post,
    path = "/api/salaires/generate",
    request_body = GenerateSalaire,
    responses(
        (status = 201, description = "Salary generated", body = SalaireResponse),
        (status = 409, description = "A salary already exists for that month")
    ),
    tag = "Salaires",
    security(("bearer_auth" = []))
)]
pub async fn generate_salaire(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<GenerateSalaire>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    check_amounts(&[payload.bonus, payload.deductions])?;
    let month = parse_month(&payload.month)?;
    let employee = visible_user(pool.get_ref(), &auth, payload.user_id).await?;

    let summary = monthly_summary(pool.get_ref(), employee.id, month).await?;
    let breakdown = compute_salary(
        employee.base_salary,
        summary.overtime_hours,
        payload.bonus.unwrap_or(0.0),
        payload.deductions.unwrap_or(0.0),
        &pay_policy(&config),
    );

    let result = sqlx::query(
        r#"
        INSERT INTO salaires
            (user_id, month, base_salary, overtime_hours, overtime_pay, bonus, deductions, net_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee.id)
    .bind(month)
    .bind(breakdown.base_salary)
    .bind(breakdown.overtime_hours)
    .bind(breakdown.overtime_pay)
    .bind(breakdown.bonus)
    .bind(breakdown.deductions)
    .bind(breakdown.net_salary)
    .execute(pool.get_ref())
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict("A salary already exists for that month".to_string())
        }
        other => other,
    })?;

    let salaire = fetch_salaire(pool.get_ref(), result.last_insert_id()).await?;
    info!(
        user_id = employee.id,
        %month,
        net_salary = salaire.net_salary,
        "Salary generated"
    );

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "salaires",
        Some(salaire.id),
        None,
        serde_json::to_value(&salaire).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(SalaireResponse { salaire, breakdown }))
}

/// List salaries
#[utoipa::path(
    get,
    path = "/api/salaires",
    params(SalaireQuery),
    responses((status = 200, description = "Paginated salaries", body = SalaireListResponse)),
    tag = "Salaires",
    security(("bearer_auth" = []))
)]
pub async fn list_salaires(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SalaireQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let user_filter = if auth.is_hr_or_admin() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let mut filters = Filters::new();
    filters
        .push_opt_u64("s.user_id = ?", user_filter)
        .push_opt_u64("u.societe_id = ?", auth.societe_scope());
    if let Some(month) = &query.month {
        filters.push("s.month = ?", FilterValue::Date(parse_month(month)?));
    }
    let where_clause = filters.where_clause();

    let count_sql = format!(
        "SELECT COUNT(*) FROM salaires s JOIN users u ON u.id = s.user_id{}",
        where_clause
    );
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT s.id, s.user_id, s.month, s.base_salary, s.overtime_hours, s.overtime_pay, \
         s.bonus, s.deductions, s.net_salary \
         FROM salaires s JOIN users u ON u.id = s.user_id{} \
         ORDER BY s.month DESC, s.user_id LIMIT ? OFFSET ?",
        where_clause
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Salaire>(&data_sql))
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(SalaireListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get a salary by ID
#[utoipa::path(
    get,
    path = "/api/salaires/{salaire_id}",
    params(("salaire_id" = u64, Path, description = "Salaire ID")),
    responses(
        (status = 200, description = "Salary found", body = Salaire),
        (status = 404, description = "Salary not found")
    ),
    tag = "Salaires",
    security(("bearer_auth" = []))
)]
pub async fn get_salaire(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let salaire = fetch_salaire(pool.get_ref(), path.into_inner()).await?;
    auth.require_self_or_hr(salaire.user_id)?;
    visible_user(pool.get_ref(), &auth, salaire.user_id).await?;
    Ok(HttpResponse::Ok().json(salaire))
}

/// Adjust a salary; net salary is recomputed
#[utoipa::path(
    put,
    path = "/api/salaires/{salaire_id}",
    params(("salaire_id" = u64, Path, description = "Salaire ID")),
    request_body = SalaireUpdate,
    responses(
        (status = 200, description = "Salary updated", body = SalaireResponse),
        (status = 404, description = "Salary not found")
    ),
    tag = "Salaires",
    security(("bearer_auth" = []))
)]
pub async fn update_salaire(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<SalaireUpdate>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    check_amounts(&[
        payload.base_salary,
        payload.overtime_hours,
        payload.bonus,
        payload.deductions,
    ])?;
    let id = path.into_inner();
    let before = fetch_salaire(pool.get_ref(), id).await?;
    visible_user(pool.get_ref(), &auth, before.user_id).await?;

    let breakdown = compute_salary(
        payload.base_salary.unwrap_or(before.base_salary),
        payload.overtime_hours.unwrap_or(before.overtime_hours),
        payload.bonus.unwrap_or(before.bonus),
        payload.deductions.unwrap_or(before.deductions),
        &pay_policy(&config),
    );

    sqlx::query(
        r#"
        UPDATE salaires
        SET base_salary = ?, overtime_hours = ?, overtime_pay = ?, bonus = ?, deductions = ?,
            net_salary = ?
        WHERE id = ?
        "#,
    )
    .bind(breakdown.base_salary)
    .bind(breakdown.overtime_hours)
    .bind(breakdown.overtime_pay)
    .bind(breakdown.bonus)
    .bind(breakdown.deductions)
    .bind(breakdown.net_salary)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    let salaire = fetch_salaire(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "salaires",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&salaire).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(SalaireResponse { salaire, breakdown }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(check_amounts(&[Some(10.0), None]).is_ok());
        assert!(check_amounts(&[Some(-1.0)]).is_err());
        assert!(check_amounts(&[Some(f64::NAN)]).is_err());
    }
}
