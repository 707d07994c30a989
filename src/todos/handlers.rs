use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateTodoRequest, MessageResponse, TodoResponse, ToggleResponse, UpdateTodoRequest};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, AppJson},
    state::AppState,
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", post(create_todo).get(list_todos))
        .route("/:user_id/:todo_id", put(update_todo).delete(delete_todo))
        .route("/:user_id/:todo_id/toggle", patch(toggle_todo))
}

/// The owner always comes from the session; the path id must name the same user.
fn resolve_owner(session_user: Uuid, path_user: &str) -> Result<Uuid, ApiError> {
    let path_user = Uuid::parse_str(path_user)
        .map_err(|_| ApiError::InvalidIdentifier("Invalid user ID".into()))?;
    if path_user != session_user {
        warn!(%session_user, %path_user, "path user does not match session");
        return Err(ApiError::not_found("Todo not found or unauthorized"));
    }
    Ok(session_user)
}

fn resolve_owned_todo(
    session_user: Uuid,
    path_user: &str,
    path_todo: &str,
) -> Result<(Uuid, Uuid), ApiError> {
    let invalid = || ApiError::InvalidIdentifier("Invalid user ID or Todo ID".into());
    let todo_id = Uuid::parse_str(path_todo).map_err(|_| invalid())?;
    let owner = resolve_owner(session_user, path_user).map_err(|e| match e {
        ApiError::InvalidIdentifier(_) => invalid(),
        other => other,
    })?;
    Ok((owner, todo_id))
}

#[instrument(skip(state, body))]
pub async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(path_user): Path<String>,
    AppJson(body): AppJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>), ApiError> {
    let owner = resolve_owner(user_id, &path_user)?;
    let new_todo = body.into_new_todo(owner)?;
    let todo = state.todos.insert(new_todo).await?;
    info!(todo_id = %todo.id, %owner, "todo created");
    Ok((StatusCode::CREATED, Json(todo.into())))
}

#[instrument(skip(state))]
pub async fn list_todos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(path_user): Path<String>,
) -> Result<Json<Vec<TodoResponse>>, ApiError> {
    let owner = resolve_owner(user_id, &path_user)?;
    let todos = state.todos.list_by_owner(owner).await?;
    if todos.is_empty() && state.config.empty_list_not_found {
        return Err(ApiError::not_found("No todos found for this user"));
    }
    Ok(Json(todos.into_iter().map(TodoResponse::from).collect()))
}

#[instrument(skip(state, body))]
pub async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((path_user, path_todo)): Path<(String, String)>,
    AppJson(body): AppJson<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>, ApiError> {
    let (owner, todo_id) = resolve_owned_todo(user_id, &path_user, &path_todo)?;
    let changes = body.into_changes()?;
    let todo = state
        .todos
        .update_owned(owner, todo_id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Todo not found or unauthorized"))?;
    info!(%todo_id, %owner, "todo updated");
    Ok(Json(todo.into()))
}

#[instrument(skip(state))]
pub async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((path_user, path_todo)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (owner, todo_id) = resolve_owned_todo(user_id, &path_user, &path_todo)?;
    if !state.todos.delete_owned(owner, todo_id).await? {
        return Err(ApiError::not_found("Todo not found or unauthorized"));
    }
    info!(%todo_id, %owner, "todo deleted");
    Ok(Json(MessageResponse {
        message: "Todo deleted successfully",
    }))
}

#[instrument(skip(state))]
pub async fn toggle_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((path_user, path_todo)): Path<(String, String)>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let (owner, todo_id) = resolve_owned_todo(user_id, &path_user, &path_todo)?;
    let todo = state
        .todos
        .toggle_owned(owner, todo_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Todo not found"))?;
    let message = if todo.status.is_completed() {
        "Todo marked as completed"
    } else {
        "Todo marked as incomplete"
    };
    info!(%todo_id, %owner, status = ?todo.status, "todo toggled");
    Ok(Json(ToggleResponse {
        message: message.to_string(),
        todo: todo.into(),
    }))
}
