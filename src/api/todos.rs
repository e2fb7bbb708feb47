use std::str::FromStr;

use crate::{
    api::{FilterValue, Filters, message, users::visible_user},
    auth::auth::AuthUser,
    error::AppError,
    model::{
        audit::AuditAction,
        role::Role,
        todo::{TASK_COLUMNS, TaskPriority, TaskStatus, TodoList, TodoTask},
    },
    services::{
        audit_log,
        deadline_check::status_after_deadline_change,
        notifier::{NotificationQueue, task_assigned_message},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const LIST_COLUMNS: &str = "id, title, owner_id, departement_id, created_at";

#[derive(Deserialize, ToSchema)]
pub struct TodoListInput {
    #[schema(example = "Inventory Q1")]
    pub title: String,
    pub departement_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = "Count warehouse B")]
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub deadline: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub deadline: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
}

#[derive(Deserialize, ToSchema)]
pub struct TaskStatusInput {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskQuery {
    #[param(example = "in_progress")]
    pub status: Option<String>,
    pub assignee_id: Option<u64>,
}

async fn fetch_list(pool: &MySqlPool, id: u64) -> Result<TodoList, AppError> {
    sqlx::query_as::<_, TodoList>(&format!("SELECT {LIST_COLUMNS} FROM todo_lists WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Todo list not found"))
}

async fn fetch_task(pool: &MySqlPool, id: u64) -> Result<TodoTask, AppError> {
    sqlx::query_as::<_, TodoTask>(&format!("SELECT {TASK_COLUMNS} FROM todo_tasks WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}

/// List owner, managers and HR/Admin may change a list and its tasks.
fn can_manage(auth: &AuthUser, list: &TodoList) -> bool {
    list.owner_id == auth.user_id || auth.is_hr_or_admin() || auth.role == Role::Manager
}

/// Loads a list in the caller's societe that the caller may manage.
async fn managed_list(pool: &MySqlPool, auth: &AuthUser, list_id: u64) -> Result<TodoList, AppError> {
    let list = fetch_list(pool, list_id).await?;
    visible_user(pool, auth, list.owner_id).await?;
    if !can_manage(auth, &list) {
        return Err(AppError::forbidden("Not allowed to manage this list"));
    }
    Ok(list)
}

async fn notify_assignee(
    pool: &MySqlPool,
    auth: &AuthUser,
    queue: &NotificationQueue,
    assignee_id: u64,
    task: &TodoTask,
) -> Result<(), AppError> {
    let assignee = visible_user(pool, auth, assignee_id).await?;
    queue.enqueue(
        assignee.phone.as_deref(),
        task_assigned_message(&task.title, task.deadline),
    );
    Ok(())
}

/// Create a todo list
#[utoipa::path(
    post,
    path = "/api/todo-lists",
    request_body = TodoListInput,
    responses((status = 201, description = "List created", body = TodoList)),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn create_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<TodoListInput>,
) -> Result<HttpResponse, AppError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }

    let result = sqlx::query("INSERT INTO todo_lists (title, owner_id, departement_id) VALUES (?, ?, ?)")
        .bind(title)
        .bind(auth.user_id)
        .bind(payload.departement_id.or(auth.departement_id))
        .execute(pool.get_ref())
        .await?;

    let list = fetch_list(pool.get_ref(), result.last_insert_id()).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "todo_lists",
        Some(list.id),
        None,
        serde_json::to_value(&list).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(list))
}

/// List todo lists
///
/// HR and admins see every list of their societe. Others see the lists they
/// own, those of their departement and those holding a task assigned to them.
#[utoipa::path(
    get,
    path = "/api/todo-lists",
    responses((status = 200, description = "Visible lists", body = [TodoList])),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn list_lists(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let mut filters = Filters::new();
    filters.push_opt_u64("u.societe_id = ?", auth.societe_scope());

    if !auth.is_hr_or_admin() {
        filters.push_all(
            "(l.owner_id = ? OR l.departement_id = ? OR EXISTS \
             (SELECT 1 FROM todo_tasks t WHERE t.list_id = l.id AND t.assignee_id = ?))",
            [
                FilterValue::U64(auth.user_id),
                FilterValue::U64(auth.departement_id.unwrap_or(0)),
                FilterValue::U64(auth.user_id),
            ],
        );
    }

    let sql = format!(
        "SELECT l.id, l.title, l.owner_id, l.departement_id, l.created_at \
         FROM todo_lists l JOIN users u ON u.id = l.owner_id{} ORDER BY l.id DESC",
        filters.where_clause()
    );
    let lists = filters
        .bind_as(sqlx::query_as::<_, TodoList>(&sql))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(lists))
}

/// Rename a todo list
#[utoipa::path(
    put,
    path = "/api/todo-lists/{list_id}",
    params(("list_id" = u64, Path, description = "Todo list ID")),
    request_body = TodoListInput,
    responses(
        (status = 200, description = "List updated", body = TodoList),
        (status = 404, description = "List not found")
    ),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn update_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TodoListInput>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let before = managed_list(pool.get_ref(), &auth, id).await?;
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }

    sqlx::query("UPDATE todo_lists SET title = ?, departement_id = ? WHERE id = ?")
        .bind(title)
        .bind(payload.departement_id.or(before.departement_id))
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    let after = fetch_list(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "todo_lists",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a todo list and its tasks
#[utoipa::path(
    delete,
    path = "/api/todo-lists/{list_id}",
    params(("list_id" = u64, Path, description = "Todo list ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "List not found")
    ),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn delete_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let list = managed_list(pool.get_ref(), &auth, id).await?;

    sqlx::query("DELETE FROM todo_lists WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "todo_lists",
        Some(id),
        serde_json::to_value(&list).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}

/// Add a task to a list; the assignee is notified
#[utoipa::path(
    post,
    path = "/api/todo-lists/{list_id}/tasks",
    params(("list_id" = u64, Path, description = "Todo list ID")),
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created", body = TodoTask),
        (status = 403, description = "Not allowed to manage this list")
    ),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    queue: web::Data<NotificationQueue>,
    path: web::Path<u64>,
    payload: web::Json<CreateTask>,
) -> Result<HttpResponse, AppError> {
    let list = managed_list(pool.get_ref(), &auth, path.into_inner()).await?;
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    if let Some(assignee_id) = payload.assignee_id {
        visible_user(pool.get_ref(), &auth, assignee_id).await?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO todo_tasks (list_id, title, description, assignee_id, deadline, priority)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(list.id)
    .bind(title)
    .bind(&payload.description)
    .bind(payload.assignee_id)
    .bind(payload.deadline)
    .bind(payload.priority.unwrap_or(TaskPriority::Medium).to_string())
    .execute(pool.get_ref())
    .await?;

    let task = fetch_task(pool.get_ref(), result.last_insert_id()).await?;
    info!(task_id = task.id, list_id = list.id, assignee_id = ?task.assignee_id, "Task created");

    if let Some(assignee_id) = task.assignee_id {
        notify_assignee(pool.get_ref(), &auth, queue.get_ref(), assignee_id, &task).await?;
    }

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Create,
        "todo_tasks",
        Some(task.id),
        None,
        serde_json::to_value(&task).ok(),
    )
    .await;

    Ok(HttpResponse::Created().json(task))
}

/// Tasks of a list
#[utoipa::path(
    get,
    path = "/api/todo-lists/{list_id}/tasks",
    params(("list_id" = u64, Path, description = "Todo list ID"), TaskQuery),
    responses((status = 200, description = "Tasks ordered by deadline", body = [TodoTask])),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<TaskQuery>,
) -> Result<HttpResponse, AppError> {
    let list = fetch_list(pool.get_ref(), path.into_inner()).await?;
    visible_user(pool.get_ref(), &auth, list.owner_id).await?;

    let mut filters = Filters::new();
    filters
        .push_opt_u64("list_id = ?", Some(list.id))
        .push_opt_u64("assignee_id = ?", query.assignee_id);
    if let Some(status) = &query.status {
        let status = TaskStatus::from_str(status)
            .map_err(|_| AppError::bad_request(format!("Unknown status '{status}'")))?;
        filters.push("status = ?", FilterValue::Str(status.to_string()));
    }

    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM todo_tasks{} ORDER BY deadline IS NULL, deadline, id",
        filters.where_clause()
    );
    let tasks = filters
        .bind_as(sqlx::query_as::<_, TodoTask>(&sql))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// Edit a task
///
/// A new deadline re-arms the due-soon and overdue notifications and reopens
/// an overdue task whose deadline is no longer past; a new assignee is
/// notified.
#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = UpdateTask,
    responses(
        (status = 200, description = "Task updated", body = TodoTask),
        (status = 404, description = "Task not found")
    ),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    queue: web::Data<NotificationQueue>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTask>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let before = fetch_task(pool.get_ref(), id).await?;
    managed_list(pool.get_ref(), &auth, before.list_id).await?;

    let title = match payload.title.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("Title cannot be empty")),
        Some(t) => t.to_string(),
        None => before.title.clone(),
    };
    let assignee_id = payload.assignee_id.or(before.assignee_id);
    let deadline = payload.deadline.or(before.deadline);
    let priority = match payload.priority {
        Some(p) => p.to_string(),
        None => before.priority.clone(),
    };
    let deadline_changed = deadline != before.deadline;
    let assignee_changed = assignee_id != before.assignee_id;

    let status = if deadline_changed {
        let current = TaskStatus::from_str(&before.status)
            .map_err(|_| AppError::Internal(format!("Unknown task status '{}'", before.status)))?;
        status_after_deadline_change(current, deadline, Local::now().date_naive()).to_string()
    } else {
        before.status.clone()
    };

    if let (true, Some(new_assignee)) = (assignee_changed, assignee_id) {
        visible_user(pool.get_ref(), &auth, new_assignee).await?;
    }

    sqlx::query(
        r#"
        UPDATE todo_tasks
        SET title = ?, description = ?, assignee_id = ?, deadline = ?, priority = ?, status = ?,
            reminder_sent_at = IF(?, NULL, reminder_sent_at),
            overdue_notified_at = IF(?, NULL, overdue_notified_at)
        WHERE id = ?
        "#,
    )
    .bind(&title)
    .bind(payload.description.as_ref().or(before.description.as_ref()))
    .bind(assignee_id)
    .bind(deadline)
    .bind(&priority)
    .bind(&status)
    .bind(deadline_changed)
    .bind(deadline_changed)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    let after = fetch_task(pool.get_ref(), id).await?;

    if let (true, Some(new_assignee)) = (assignee_changed, after.assignee_id) {
        notify_assignee(pool.get_ref(), &auth, queue.get_ref(), new_assignee, &after).await?;
    }

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "todo_tasks",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Move a task to another status
///
/// The assignee may update their own task; so may whoever manages the list.
#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}/status",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = TaskStatusInput,
    responses(
        (status = 200, description = "Status changed", body = TodoTask),
        (status = 403, description = "Neither assignee nor list manager")
    ),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TaskStatusInput>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let before = fetch_task(pool.get_ref(), id).await?;
    let list = fetch_list(pool.get_ref(), before.list_id).await?;
    visible_user(pool.get_ref(), &auth, list.owner_id).await?;

    if before.assignee_id != Some(auth.user_id) && !can_manage(&auth, &list) {
        return Err(AppError::forbidden("Not allowed to update this task"));
    }

    sqlx::query("UPDATE todo_tasks SET status = ? WHERE id = ?")
        .bind(payload.status.to_string())
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    let after = fetch_task(pool.get_ref(), id).await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Update,
        "todo_tasks",
        Some(id),
        serde_json::to_value(&before).ok(),
        serde_json::to_value(&after).ok(),
    )
    .await;

    Ok(HttpResponse::Ok().json(after))
}

/// Delete a task
#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Task not found")
    ),
    tag = "Todos",
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let task = fetch_task(pool.get_ref(), id).await?;
    managed_list(pool.get_ref(), &auth, task.list_id).await?;

    sqlx::query("DELETE FROM todo_tasks WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    audit_log::record(
        pool.get_ref(),
        Some(auth.user_id),
        AuditAction::Delete,
        "todo_tasks",
        Some(id),
        serde_json::to_value(&task).ok(),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(message("Successfully deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(user_id: u64, role: Role) -> AuthUser {
        AuthUser {
            user_id,
            email: "someone@company.ma".into(),
            role,
            societe_id: 1,
            departement_id: None,
        }
    }

    fn list(owner_id: u64) -> TodoList {
        TodoList {
            id: 1,
            title: "Inventory".into(),
            owner_id,
            departement_id: None,
            created_at: None,
        }
    }

    #[test]
    fn owner_manager_and_hr_manage_lists() {
        assert!(can_manage(&auth(5, Role::Employee), &list(5)));
        assert!(can_manage(&auth(6, Role::Manager), &list(5)));
        assert!(can_manage(&auth(7, Role::Hr), &list(5)));
        assert!(!can_manage(&auth(8, Role::Employee), &list(5)));
    }
}
