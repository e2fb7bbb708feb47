use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// An employee account. Every user belongs to a societe and optionally to
/// a departement.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "matricule": "EMP-001",
        "first_name": "Amina",
        "last_name": "Benali",
        "email": "amina.benali@company.ma",
        "phone": "+212612345678",
        "role_id": 4,
        "societe_id": 1,
        "departement_id": 2,
        "position": "Technician",
        "hire_date": "2024-01-15",
        "base_salary": 8000.0,
        "initial_leave_balance": 0.0,
        "is_active": true
    })
)]
pub struct User {
    pub id: u64,
    pub matricule: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role_id: u8,
    pub societe_id: u64,
    pub departement_id: Option<u64>,
    pub position: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub base_salary: f64,
    pub initial_leave_balance: f64,
    pub is_active: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Columns selected into [`User`]; never includes the password hash.
pub const USER_COLUMNS: &str = "id, matricule, first_name, last_name, email, phone, role_id, \
     societe_id, departement_id, position, hire_date, base_salary, initial_leave_balance, \
     is_active, created_at";

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
