use std::collections::BTreeMap;

use crate::{
    api::{FilterValue, Filters, month_range, parse_month},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::pointage::Pointage,
    services::{
        export::{
            ExportFormat, ExportRow, LeaveBalanceExportRow, OvertimeExportRow, PointageExportRow,
            render,
        },
        leave_balance::{LeaveBalance, accrued_days},
        time_calculation::{ShiftPolicy, summarize_month},
    },
};
use actix_web::{HttpResponse, http::header, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::{FromRow, MySqlPool};
use tracing::info;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct MonthExportQuery {
    /// YYYY-MM
    #[param(example = "2026-01")]
    pub month: String,
    pub departement_id: Option<u64>,
    /// `xlsx` (default) or `csv`
    pub format: Option<ExportFormat>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BalanceExportQuery {
    pub departement_id: Option<u64>,
    pub format: Option<ExportFormat>,
}

#[derive(FromRow)]
struct PointageLine {
    id: u64,
    user_id: u64,
    matricule: String,
    first_name: String,
    last_name: String,
    departement: Option<String>,
    date: NaiveDate,
    check_in: NaiveTime,
    check_out: Option<NaiveTime>,
    day_hours: f64,
    night_hours: f64,
    worked_hours: f64,
    normal_hours: f64,
    overtime_hours: f64,
}

impl PointageLine {
    fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn as_pointage(&self) -> Pointage {
        Pointage {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            check_in: self.check_in,
            check_out: self.check_out,
            day_hours: self.day_hours,
            night_hours: self.night_hours,
            worked_hours: self.worked_hours,
            normal_hours: self.normal_hours,
            overtime_hours: self.overtime_hours,
        }
    }
}

#[derive(FromRow)]
struct BalanceLine {
    matricule: String,
    first_name: String,
    last_name: String,
    hire_date: NaiveDate,
    initial_leave_balance: f64,
    taken: f64,
    pending: f64,
}

fn attachment<R: ExportRow>(
    format: ExportFormat,
    sheet: &str,
    file_stem: &str,
    rows: &[R],
) -> Result<HttpResponse, AppError> {
    let bytes = render(format, sheet, rows)?;
    let filename = format!("{file_stem}.{}", format.extension());
    info!(%filename, rows = rows.len(), size = bytes.len(), "Export rendered");

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(bytes))
}

async fn pointage_lines(
    pool: &MySqlPool,
    auth: &AuthUser,
    month: NaiveDate,
    departement_id: Option<u64>,
) -> Result<Vec<PointageLine>, sqlx::Error> {
    let (start, end) = month_range(month);

    let mut filters = Filters::new();
    filters
        .push("p.date >= ?", FilterValue::Date(start))
        .push("p.date < ?", FilterValue::Date(end))
        .push_opt_u64("u.societe_id = ?", auth.societe_scope())
        .push_opt_u64("u.departement_id = ?", departement_id);

    let sql = format!(
        "SELECT p.id, p.user_id, u.matricule, u.first_name, u.last_name, d.name AS departement, \
         p.date, p.check_in, p.check_out, p.day_hours, p.night_hours, p.worked_hours, \
         p.normal_hours, p.overtime_hours \
         FROM pointages p \
         JOIN users u ON u.id = p.user_id \
         LEFT JOIN departements d ON d.id = u.departement_id{} \
         ORDER BY u.matricule, p.date",
        filters.where_clause()
    );

    filters
        .bind_as(sqlx::query_as::<_, PointageLine>(&sql))
        .fetch_all(pool)
        .await
}

/// Monthly pointages as a spreadsheet
#[utoipa::path(
    get,
    path = "/api/exports/pointages",
    params(MonthExportQuery),
    responses(
        (status = 200, description = "Spreadsheet attachment", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Exports",
    security(("bearer_auth" = []))
)]
pub async fn export_pointages(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthExportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let month = parse_month(&query.month)?;

    let rows: Vec<PointageExportRow> = pointage_lines(pool.get_ref(), &auth, month, query.departement_id)
        .await?
        .into_iter()
        .map(|l| PointageExportRow {
            full_name: l.full_name(),
            matricule: l.matricule,
            departement: l.departement,
            date: l.date,
            check_in: l.check_in,
            check_out: l.check_out,
            day_hours: l.day_hours,
            night_hours: l.night_hours,
            worked_hours: l.worked_hours,
            normal_hours: l.normal_hours,
            overtime_hours: l.overtime_hours,
        })
        .collect();

    attachment(
        query.format.unwrap_or_default(),
        "Pointages",
        &format!("pointages-{}", month.format("%Y-%m")),
        &rows,
    )
}

/// Per-employee overtime totals for a month
#[utoipa::path(
    get,
    path = "/api/exports/overtime",
    params(MonthExportQuery),
    responses(
        (status = 200, description = "Spreadsheet attachment", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Exports",
    security(("bearer_auth" = []))
)]
pub async fn export_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthExportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let month = parse_month(&query.month)?;
    let lines = pointage_lines(pool.get_ref(), &auth, month, query.departement_id).await?;

    // ordered by matricule for a stable sheet
    let mut by_user: BTreeMap<String, Vec<PointageLine>> = BTreeMap::new();
    for line in lines {
        by_user.entry(line.matricule.clone()).or_default().push(line);
    }

    let policy = ShiftPolicy::default();
    let rows: Vec<OvertimeExportRow> = by_user
        .into_values()
        .filter_map(|lines| {
            let first = lines.first()?;
            let pointages: Vec<Pointage> = lines.iter().map(PointageLine::as_pointage).collect();
            let summary = summarize_month(first.user_id, month, &pointages, &policy);
            Some(OvertimeExportRow {
                matricule: first.matricule.clone(),
                full_name: first.full_name(),
                departement: first.departement.clone(),
                days_worked: summary.days_worked,
                worked_hours: summary.worked_hours,
                normal_hours: summary.normal_hours,
                overtime_hours: summary.overtime_hours,
                night_hours: summary.night_hours,
            })
        })
        .collect();

    attachment(
        query.format.unwrap_or_default(),
        "Overtime",
        &format!("overtime-{}", month.format("%Y-%m")),
        &rows,
    )
}

/// Current leave balance of every active employee
#[utoipa::path(
    get,
    path = "/api/exports/leave-balances",
    params(BalanceExportQuery),
    responses(
        (status = 200, description = "Spreadsheet attachment", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Exports",
    security(("bearer_auth" = []))
)]
pub async fn export_leave_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BalanceExportQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let today = Local::now().date_naive();

    let mut filters = Filters::new();
    filters
        .push("u.is_active = ?", FilterValue::U64(1))
        .push_opt_u64("u.societe_id = ?", auth.societe_scope())
        .push_opt_u64("u.departement_id = ?", query.departement_id);

    let sql = format!(
        r#"
        SELECT u.matricule, u.first_name, u.last_name, u.hire_date, u.initial_leave_balance,
            COALESCE(SUM(CASE WHEN a.status = 'approved' THEN a.days END), 0) AS taken,
            COALESCE(SUM(CASE WHEN a.status = 'pending' THEN a.days END), 0) AS pending
        FROM users u
        LEFT JOIN absence_requests a ON a.user_id = u.id AND a.absence_type = 'conge'
        {}
        GROUP BY u.id, u.matricule, u.first_name, u.last_name, u.hire_date, u.initial_leave_balance
        ORDER BY u.matricule
        "#,
        filters.where_clause()
    );
    let lines = filters
        .bind_as(sqlx::query_as::<_, BalanceLine>(&sql))
        .fetch_all(pool.get_ref())
        .await?;

    let rows: Vec<LeaveBalanceExportRow> = lines
        .into_iter()
        .map(|l| {
            let balance = LeaveBalance::compute(
                l.initial_leave_balance,
                accrued_days(l.hire_date, today, config.leave_days_per_month),
                l.taken,
                l.pending,
            );
            LeaveBalanceExportRow {
                full_name: format!("{} {}", l.first_name, l.last_name),
                matricule: l.matricule,
                hire_date: l.hire_date,
                accrued: balance.accrued,
                taken: balance.taken,
                pending: balance.pending,
                available: balance.available,
            }
        })
        .collect();

    attachment(
        query.format.unwrap_or_default(),
        "Leave balances",
        &format!("leave-balances-{}", today.format("%Y-%m-%d")),
        &rows,
    )
}
