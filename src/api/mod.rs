pub mod absences;
pub mod audits;
pub mod departements;
pub mod exports;
pub mod jours_feries;
pub mod pointages;
pub mod publications;
pub mod salaires;
pub mod societes;
pub mod todos;
pub mod users;

use chrono::{Months, NaiveDate};
use serde_json::{Value, json};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::{QueryAs, QueryScalar};

use crate::error::AppError;

/// Resolves `(page, per_page, offset)`; page is 1-based, per_page is capped
/// at 100. The offset is computed in `u64` so any `u32` page fits.
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    let offset = u64::from(page - 1).saturating_mul(u64::from(per_page));
    (page, per_page, offset)
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("Invalid month '{raw}', expected YYYY-MM")))
}

/// `[start, end)` bounds of the month starting at `month`.
pub fn month_range(month: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = month.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX);
    (month, end)
}

/// Rejects a link to a record owned by another societe.
pub fn require_same_tenant(owner_societe_id: u64, societe_id: u64, what: &str) -> Result<(), AppError> {
    if owner_societe_id == societe_id {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("{what} belongs to another societe")))
    }
}

/// Id field of a partial-update body; `None` when absent or null.
pub fn optional_id(body: &Value, key: &str) -> Result<Option<u64>, AppError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| AppError::bad_request(format!("{key} must be a positive integer"))),
    }
}

pub fn message(text: &str) -> Value {
    json!({ "message": text })
}

// Helper enum for typed SQLx binding
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

/// Accumulates `AND`-joined conditions and their bind values.
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    args: Vec<FilterValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: &str, value: FilterValue) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.args.push(value);
        self
    }

    /// One condition carrying several placeholders.
    pub fn push_all(
        &mut self,
        condition: &str,
        values: impl IntoIterator<Item = FilterValue>,
    ) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.args.extend(values);
        self
    }

    pub fn push_opt_u64(&mut self, condition: &str, value: Option<u64>) -> &mut Self {
        if let Some(v) = value {
            self.push(condition, FilterValue::U64(v));
        }
        self
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn bind_as<'q, O>(
        &'q self,
        mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        for arg in &self.args {
            query = match arg {
                FilterValue::U64(v) => query.bind(*v),
                FilterValue::Str(s) => query.bind(s.as_str()),
                FilterValue::Date(d) => query.bind(*d),
            };
        }
        query
    }

    pub fn bind_scalar<'q, O>(
        &'q self,
        mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        for arg in &self.args {
            query = match arg {
                FilterValue::U64(v) => query.bind(*v),
                FilterValue::Str(s) => query.bind(s.as_str()),
                FilterValue::Date(d) => query.bind(*d),
            };
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_clamps_inputs() {
        assert_eq!(page_bounds(None, None, 20), (1, 20, 0));
        assert_eq!(page_bounds(Some(0), Some(500), 20), (1, 100, 0));
        assert_eq!(page_bounds(Some(3), Some(10), 20), (3, 10, 20));
    }

    #[test]
    fn page_bounds_handles_largest_page() {
        let (page, per_page, offset) = page_bounds(Some(u32::MAX), Some(100), 20);
        assert_eq!(page, u32::MAX);
        assert_eq!(per_page, 100);
        assert_eq!(offset, (u32::MAX as u64 - 1) * 100);
    }

    #[test]
    fn cross_societe_links_are_rejected() {
        assert!(require_same_tenant(2, 2, "Departement").is_ok());
        let err = require_same_tenant(3, 2, "Departement").unwrap_err();
        assert_eq!(err.to_string(), "Departement belongs to another societe");
    }

    #[test]
    fn optional_id_reads_update_bodies() {
        let body = json!({ "departement_id": 4, "manager_id": null, "phone": "x" });
        assert_eq!(optional_id(&body, "departement_id").unwrap(), Some(4));
        assert_eq!(optional_id(&body, "manager_id").unwrap(), None);
        assert_eq!(optional_id(&body, "missing").unwrap(), None);
        assert!(optional_id(&body, "phone").is_err());
    }

    #[test]
    fn parses_months() {
        assert_eq!(
            parse_month("2026-02").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
        );
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("feb").is_err());

        let (start, end) = month_range(NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn filters_build_where_clause() {
        let mut filters = Filters::new();
        assert_eq!(filters.where_clause(), "");

        filters
            .push_opt_u64("user_id = ?", Some(3))
            .push_opt_u64("societe_id = ?", None)
            .push("status = ?", FilterValue::Str("pending".into()));
        assert_eq!(filters.where_clause(), " WHERE user_id = ? AND status = ?");

        filters.push_all(
            "(a LIKE ? OR b LIKE ?)",
            vec![FilterValue::Str("%x%".into()), FilterValue::Str("%x%".into())],
        );
        assert_eq!(filters.args.len(), 4);
    }
}
