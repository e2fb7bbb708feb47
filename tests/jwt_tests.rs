use hr_payroll::auth::jwt::{
    TokenSubject, generate_access_token, generate_refresh_token, verify_token,
};
use hr_payroll::model::role::Role;
use hr_payroll::models::TokenType;
use pretty_assertions::assert_eq;

mod common;
use common::TEST_SECRET;

fn subject(role: Role) -> TokenSubject {
    TokenSubject {
        user_id: 42,
        email: "amina@example.com".to_string(),
        role: role.id(),
        societe_id: 3,
        departement_id: Some(7),
    }
}

#[test]
fn access_token_round_trips_identity() {
    let token = generate_access_token(&subject(Role::Manager), TEST_SECRET, 60).unwrap();
    let claims = verify_token(&token, TEST_SECRET).unwrap();

    assert_eq!(claims.user_id, 42);
    assert_eq!(claims.sub, "amina@example.com");
    assert_eq!(claims.role, Role::Manager.id());
    assert_eq!(claims.departement_id, Some(7));
    assert_eq!(claims.token_type, TokenType::Access);
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let token = generate_access_token(&subject(Role::Employee), "other-secret", 60).unwrap();
    assert!(verify_token(&token, TEST_SECRET).is_err());
}

#[test]
fn refresh_tokens_get_unique_ids() {
    let (_, first) = generate_refresh_token(&subject(Role::Employee), TEST_SECRET, 60).unwrap();
    let (_, second) = generate_refresh_token(&subject(Role::Employee), TEST_SECRET, 60).unwrap();

    assert_eq!(first.token_type, TokenType::Refresh);
    assert!(first.jti != second.jti);
}
