use crate::api::{
    absences::{AbsenceListResponse, CreateAbsence},
    audits::AuditListResponse,
    departements::CreateDepartement,
    jours_feries::JourFerieInput,
    pointages::{ManualPointage, PointageListResponse, PointageUpdate},
    publications::{PublicationInput, PublicationListResponse, VoteInput},
    salaires::{GenerateSalaire, SalaireListResponse, SalaireResponse, SalaireUpdate},
    societes::CreateSociete,
    todos::{CreateTask, TaskStatusInput, TodoListInput, UpdateTask},
    users::{CreateUser, LeaveBalanceResponse, UserListResponse},
};
use crate::model::{
    absence_request::{AbsenceRequest, AbsenceStatus, AbsenceType},
    audit::Audit,
    departement::Departement,
    jour_ferie::JourFerie,
    pointage::Pointage,
    publication::Publication,
    role::Role,
    salaire::Salaire,
    societe::Societe,
    todo::{TaskPriority, TaskStatus, TodoList, TodoTask},
    user::User,
};
use crate::models::{LoginReqDto, TokenPair};
use crate::services::{
    export::ExportFormat,
    leave_balance::LeaveBalance,
    payroll::SalaryBreakdown,
    time_calculation::{DailyHours, MonthlySummary},
};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Payroll API",
        version = "1.0.0",
        description = r#"
## HR / Payroll / Attendance backend

Administrative record keeping for an HR department.

### Key Features
- **Employees** with departements and societes
- **Pointages**: daily check-in/check-out with day/night split, pause deduction and overtime
- **Absences**: requests, review workflow, paid-leave balance
- **Salaires**: monthly salary from base pay and overtime
- **Tasks** with deadline reminders over SMS/WhatsApp
- **Publications** with up/down votes
- **Exports** to XLSX and CSV
- **Audit trail** of every change

### Security
Endpoints under `/api` require a **JWT Bearer** access token obtained from `/auth/login`.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::me,
        crate::api::users::update_user,
        crate::api::users::delete_user,
        crate::api::users::leave_balance,

        crate::api::departements::create_departement,
        crate::api::departements::list_departements,
        crate::api::departements::get_departement,
        crate::api::departements::update_departement,
        crate::api::departements::delete_departement,

        crate::api::societes::create_societe,
        crate::api::societes::list_societes,
        crate::api::societes::get_societe,
        crate::api::societes::update_societe,
        crate::api::societes::delete_societe,

        crate::api::jours_feries::create_jour_ferie,
        crate::api::jours_feries::list_jours_feries,
        crate::api::jours_feries::update_jour_ferie,
        crate::api::jours_feries::delete_jour_ferie,

        crate::api::pointages::check_in,
        crate::api::pointages::check_out,
        crate::api::pointages::create_pointage,
        crate::api::pointages::update_pointage,
        crate::api::pointages::delete_pointage,
        crate::api::pointages::list_pointages,
        crate::api::pointages::summary,

        crate::api::absences::create_absence,
        crate::api::absences::list_absences,
        crate::api::absences::get_absence,
        crate::api::absences::approve_absence,
        crate::api::absences::reject_absence,
        crate::api::absences::cancel_absence,

        crate::api::salaires::generate_salaire,
        crate::api::salaires::list_salaires,
        crate::api::salaires::get_salaire,
        crate::api::salaires::update_salaire,

        crate::api::todos::create_list,
        crate::api::todos::list_lists,
        crate::api::todos::update_list,
        crate::api::todos::delete_list,
        crate::api::todos::create_task,
        crate::api::todos::list_tasks,
        crate::api::todos::update_task,
        crate::api::todos::update_task_status,
        crate::api::todos::delete_task,

        crate::api::publications::create_publication,
        crate::api::publications::list_publications,
        crate::api::publications::get_publication,
        crate::api::publications::update_publication,
        crate::api::publications::delete_publication,
        crate::api::publications::vote,
        crate::api::publications::unvote,

        crate::api::audits::list_audits,

        crate::api::exports::export_pointages,
        crate::api::exports::export_overtime,
        crate::api::exports::export_leave_balances
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            Role,
            User,
            CreateUser,
            UserListResponse,
            LeaveBalance,
            LeaveBalanceResponse,
            Departement,
            CreateDepartement,
            Societe,
            CreateSociete,
            JourFerie,
            JourFerieInput,
            Pointage,
            ManualPointage,
            PointageUpdate,
            PointageListResponse,
            DailyHours,
            MonthlySummary,
            AbsenceRequest,
            AbsenceType,
            AbsenceStatus,
            CreateAbsence,
            AbsenceListResponse,
            Salaire,
            SalaryBreakdown,
            GenerateSalaire,
            SalaireUpdate,
            SalaireResponse,
            SalaireListResponse,
            TodoList,
            TodoTask,
            TaskStatus,
            TaskPriority,
            TodoListInput,
            CreateTask,
            UpdateTask,
            TaskStatusInput,
            Publication,
            PublicationInput,
            PublicationListResponse,
            VoteInput,
            Audit,
            AuditListResponse,
            ExportFormat
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and logout"),
        (name = "Users", description = "Employee management APIs"),
        (name = "Departements", description = "Departement management APIs"),
        (name = "Societes", description = "Societe management APIs (Admin)"),
        (name = "Jours feries", description = "Public holidays"),
        (name = "Pointages", description = "Attendance and worked hours"),
        (name = "Absences", description = "Absence requests and review"),
        (name = "Salaires", description = "Monthly salaries"),
        (name = "Todos", description = "Todo lists and tasks"),
        (name = "Publications", description = "Announcements and votes"),
        (name = "Audits", description = "Audit trail (Admin)"),
        (name = "Exports", description = "Spreadsheet exports"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_declares_bearer_scheme_and_core_paths() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/pointages/check-out"));
        assert!(doc.paths.paths.contains_key("/api/publications/{publication_id}/vote"));
    }
}
