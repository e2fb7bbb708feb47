use actix_web::{
    App, HttpResponse, http::StatusCode, middleware::from_fn, test, web,
};
use hr_payroll::auth::auth::AuthUser;
use hr_payroll::auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token};
use hr_payroll::auth::middleware::auth_middleware;
use hr_payroll::error::AppError;
use hr_payroll::model::role::Role;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

mod common;
use common::{TEST_SECRET, test_config};

fn subject(role: Role) -> TokenSubject {
    TokenSubject {
        user_id: 42,
        email: "amina@example.com".to_string(),
        role: role.id(),
        societe_id: 3,
        departement_id: Some(7),
    }
}

async fn whoami(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "user_id": auth.user_id,
        "societe_id": auth.societe_id,
        "is_hr": auth.is_hr_or_admin(),
    }))
}

async fn hr_only(auth: AuthUser) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    Ok(HttpResponse::NoContent().finish())
}

macro_rules! protected_app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .route("/whoami", web::get().to(whoami))
                        .route("/hr-only", web::get().to(hr_only)),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn missing_header_is_unauthorized() {
    let app = protected_app!();

    let req = test::TestRequest::get().uri("/api/whoami").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn non_bearer_header_is_unauthorized() {
    let app = protected_app!();

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", "Basic YWRtaW46YWRtaW4="))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn access_token_reaches_handler() {
    let app = protected_app!();
    let token = generate_access_token(&subject(Role::Hr), TEST_SECRET, 60).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({"user_id": 42, "societe_id": 3, "is_hr": true}));
}

#[actix_web::test]
async fn refresh_token_cannot_call_the_api() {
    let app = protected_app!();
    let (token, _) = generate_refresh_token(&subject(Role::Admin), TEST_SECRET, 60).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn employee_is_forbidden_from_hr_routes() {
    let app = protected_app!();
    let token = generate_access_token(&subject(Role::Employee), TEST_SECRET, 60).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/hr-only")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "HR/Admin only");
}
