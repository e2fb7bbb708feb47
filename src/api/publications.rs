use crate::{
    api::{Filters, message, page_bounds},
    auth::auth::AuthUser,
    error::AppError,
    model::{
        audit::AuditAction,
        publication::{PUBLICATION_SELECT, Publication, VoteValue},
    },
    services::audit_log,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct PublicationInput {
    #[schema(example = "New canteen opening hours")]
    pub title: String,
    #[schema(example = "Starting Monday the canteen opens at 11:30.")]
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VoteInput {
    /// `1` for an up-vote, `-1` for a down-vote
    #[schema(example = 1)]
    pub value: i8,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PublicationQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub author_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct PublicationListResponse {
    pub data: Vec<Publication>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn fetch_publication(pool: &MySqlPool, id: u64) -> Result<Publication, AppError> {
    sqlx::query_as::<_, Publication>(&format!("{PUBLICATION_SELECT} WHERE p.id = ? GROUP BY p.id"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Publication not found"))
}

async fn visible_publication(
    pool: &MySqlPool,
    auth: &AuthUser,
    id: u64,
) -> Result<Publication, AppError> {
    let publication = fetch_publication(pool, id).await?;
    auth.require_same_societe(publication.societe_id)?;
    Ok(publication)
}

fn validate(input: &PublicationInput) -> Result<(&str, &str), AppError> {
    let title = input.title.trim();
    let content = input.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::bad_request("Title and content are required"));
    }
    Ok((title, content))
}

/// Publish an announcement to the caller's societe
#[utoipa::path(
    post,
    path = "/api/publications",
    request_body = PublicationInput,
    responses((status = 201, description = "Publication created", body = Publication)),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn create_publication(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PublicationInput>,
) -> Result<HttpResponse, AppError> {
    let (title, content) = validate(&payload)?;

    let result = sqlx::query(
        "INSERT INTO publications (author_id, societe_id, title, content) VALUES (?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(auth.societe_id)
    .bind(title)
    .bind(content)
    .execute(pool.get_ref())
    .await?;

    let publication = fetch_publication(pool.get_ref(), result.last_insert_id()).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "publications",
        Some(publication.id),
        None,
        serde_json::to_value(&publication).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(publication))
}

/// List publications with their vote counts, newest first
#[utoipa::path(
    get,
    path = "/api/publications",
    params(PublicationQuery),
    responses((status = 200, description = "Paginated publications", body = PublicationListResponse)),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn list_publications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PublicationQuery>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut filters = Filters::new();
    filters
        .push_opt_u64("p.societe_id = ?", auth.societe_scope())
        .push_opt_u64("p.author_id = ?", query.author_id);
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM publications p{}", where_clause);
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "{PUBLICATION_SELECT}{} GROUP BY p.id ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let data = filters
        .bind_as(sqlx::query_as::<_, Publication>(&data_sql))
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PublicationListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get a publication
#[utoipa::path(
    get,
    path = "/api/publications/{publication_id}",
    params(("publication_id" = u64, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Publication found", body = Publication),
        (status = 404, description = "Publication not found")
    ),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn get_publication(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let publication = visible_publication(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(publication))
}

/// Edit a publication (author or HR/Admin)
#[utoipa::path(
    put,
    path = "/api/publications/{publication_id}",
    params(("publication_id" = u64, Path, description = "Publication ID")),
    request_body = PublicationInput,
    responses(
        (status = 200, description = "Publication updated", body = Publication),
        (status = 403, description = "Not the author")
    ),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn update_publication(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PublicationInput>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let before = visible_publication(pool.get_ref(), &auth, id).await?;
    auth.require_self_or_hr(before.author_id)?;
    let (title, content) = validate(&payload)?;

    sqlx::query("UPDATE publications SET title = ?, content = ? WHERE id = ?")
        .bind(title)
        .bind(content)
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    let after = fetch_publication(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "publications",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a publication (author or HR/Admin)
#[utoipa::path(
    delete,
    path = "/api/publications/{publication_id}",
    params(("publication_id" = u64, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Not the author")
    ),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn delete_publication(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let publication = visible_publication(pool.get_ref(), &auth, id).await?;
    auth.require_self_or_hr(publication.author_id)?;

    sqlx::query("DELETE FROM publications WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "publications",
        Some(id),
        serde_json::to_value(&publication).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}

/// Vote on a publication
///
/// One vote per user; voting again replaces the previous value.
#[utoipa::path(
    put,
    path = "/api/publications/{publication_id}/vote",
    params(("publication_id" = u64, Path, description = "Publication ID")),
    request_body = VoteInput,
    responses(
        (status = 200, description = "Vote recorded, updated counts returned", body = Publication),
        (status = 400, description = "Value must be 1 or -1")
    ),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn vote(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<VoteInput>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let value = VoteValue::from_i8(payload.value)
        .ok_or_else(|| AppError::bad_request("Vote value must be 1 or -1"))?;
    visible_publication(pool.get_ref(), &auth, id).await?;

    sqlx::query(
        r#"
        INSERT INTO votes (publication_id, user_id, value)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE value = VALUES(value)
        "#,
    )
    .bind(id)
    .bind(auth.user_id)
    .bind(value.as_i8())
    .execute(pool.get_ref())
    .await?;

    let publication = fetch_publication(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(publication))
}

/// Withdraw your vote
#[utoipa::path(
    delete,
    path = "/api/publications/{publication_id}/vote",
    params(("publication_id" = u64, Path, description = "Publication ID")),
    responses((status = 200, description = "Vote removed (idempotent)", body = Publication)),
    tag = "Publications",
    security(("bearer_auth" = []))
)]
pub async fn unvote(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    visible_publication(pool.get_ref(), &auth, id).await?;

    sqlx::query("DELETE FROM votes WHERE publication_id = ? AND user_id = ?")
        .bind(id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    let publication = fetch_publication(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(publication))
}
