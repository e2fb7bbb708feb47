use crate::{
    auth::{
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::AppError,
    model::audit::AuditAction,
    models::{LoginReqDto, TokenPair, TokenType, UserSql},
    services::audit_log,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error, info, instrument};

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn issue_tokens(subject: &TokenSubject, config: &Config) -> Result<(TokenPair, crate::models::Claims), AppError> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| AppError::Internal(format!("Failed to sign access token: {e}")))?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| AppError::Internal(format!("Failed to sign refresh token: {e}")))?;

    Ok((
        TokenPair {
            access_token,
            refresh_token,
        },
        refresh_claims,
    ))
}

async fn store_refresh_token(
    pool: &MySqlPool,
    user_id: u64,
    claims: &crate::models::Claims,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(AppError::bad_request("Email and password required"));
    }

    debug!("Fetching user from database");

    // 2️⃣ Fetch user
    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, email, password, role_id, societe_id, departement_id, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(user.email.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Login refused: account disabled");
            return Err(AppError::Unauthorized);
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized);
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized);
    }

    // 4️⃣ Generate tokens
    let subject = TokenSubject {
        user_id: db_user.id,
        email: db_user.email.clone(),
        role: db_user.role_id,
        societe_id: db_user.societe_id,
        departement_id: db_user.departement_id,
    };
    let (tokens, refresh_claims) = issue_tokens(&subject, &config)?;

    // 5️⃣ Store refresh token
    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool.get_ref(), db_user.id, &refresh_claims).await?;

    // 6️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    audit_log::record(
        pool.get_ref(),
        Some(db_user.id),
        AuditAction::Login,
        "users",
        Some(db_user.id),
        None,
        None,
    )
    .await;

    info!("Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

#[derive(FromRow)]
struct RefreshRecord {
    id: u64,
    revoked: bool,
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or(AppError::Unauthorized)?;

    let claims = verify_token(token, &config.jwt_secret).map_err(|_| AppError::Unauthorized)?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized);
    }

    // 🔍 find refresh token in DB
    let record = sqlx::query_as::<_, RefreshRecord>(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await?;

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return Err(AppError::Unauthorized),
    };

    let mut tx = pool.begin().await?;

    // 🔥 revoke old refresh token
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

    // 🔄 issue new pair
    let subject = TokenSubject::from(&claims);
    let (tokens, new_claims) = issue_tokens(&subject, &config)?;

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    // 1️⃣ extract Authorization header
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    // 2️⃣ verify JWT, only refresh tokens can logout
    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // 3️⃣ revoke refresh token (idempotent)
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    // 4️⃣ success (even if token didn't exist)
    HttpResponse::NoContent().finish()
}
