use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;
use crate::auth::jwt::verify_token;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub societe_id: u64,
    pub departement_id: Option<u64>,
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // Already resolved by auth_middleware
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal("Config missing".to_string()))?;

    let claims = verify_token(token, &config.jwt_secret).map_err(|_| AppError::Unauthorized)?;
    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized);
    }

    let role = Role::from_id(claims.role).ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role,
        societe_id: claims.societe_id,
        departement_id: claims.departement_id,
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_hr_or_admin(&self) -> bool {
        self.role.is_hr_or_admin()
    }

    /// HR/Admin, or the user the record belongs to.
    pub fn require_self_or_hr(&self, owner_id: u64) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Not allowed to access this record"))
        }
    }

    /// Admin sees every societe; everyone else only their own.
    pub fn require_same_societe(&self, societe_id: u64) -> Result<(), AppError> {
        if self.is_admin() || self.societe_id == societe_id {
            Ok(())
        } else {
            Err(AppError::forbidden("Record belongs to another societe"))
        }
    }

    /// Admin accounts can only be changed or removed by an admin.
    pub fn require_can_manage_account(&self, target_role_id: u8) -> Result<(), AppError> {
        if Role::from_id(target_role_id) == Some(Role::Admin) && !self.is_admin() {
            Err(AppError::forbidden("Only an admin can modify an admin account"))
        } else {
            Ok(())
        }
    }

    /// Societe filter to apply to list queries, `None` for Admin.
    pub fn societe_scope(&self) -> Option<u64> {
        if self.is_admin() { None } else { Some(self.societe_id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 10,
            email: "x@y.z".into(),
            role,
            societe_id: 1,
            departement_id: None,
        }
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin).require_admin().is_ok());
        assert!(user(Role::Hr).require_admin().is_err());
        assert!(user(Role::Hr).require_hr_or_admin().is_ok());
        assert!(user(Role::Manager).require_hr_or_admin().is_err());
        assert!(user(Role::Employee).require_self_or_hr(10).is_ok());
        assert!(user(Role::Employee).require_self_or_hr(11).is_err());
    }

    #[test]
    fn only_admin_crosses_societes() {
        assert!(user(Role::Admin).require_same_societe(2).is_ok());
        assert!(user(Role::Hr).require_same_societe(2).is_err());
        assert_eq!(user(Role::Hr).societe_scope(), Some(1));
        assert_eq!(user(Role::Admin).societe_scope(), None);
    }

    #[test]
    fn admin_accounts_are_admin_managed() {
        let admin_id = Role::Admin.id();
        assert!(user(Role::Hr).require_can_manage_account(admin_id).is_err());
        assert!(user(Role::Hr).require_can_manage_account(Role::Employee.id()).is_ok());
        assert!(user(Role::Admin).require_can_manage_account(admin_id).is_ok());
    }
}
