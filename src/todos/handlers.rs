use super::models::CreateTodoRequest;
use super::services::TodosService;
use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tokio::sync::RwLock;

async fn service(state: &Arc<RwLock<AppState>>) -> TodosService {
    TodosService::new(state.read().await.db.clone())
}

/// GET /api/todos - All todos for admins, own todos otherwise
pub async fn list_todos(
    Extension(state): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let todos = service(&state).await.list_for(&user).await?;
    Ok(Json(todos))
}

/// POST /api/todos - Create a todo owned by the caller
pub async fn create_todo(
    Extension(state): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
    Json(request): Json<CreateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = service(&state).await.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// PUT /api/todos/:id/toggle - Flip completion (owner or admin)
pub async fn toggle_todo(
    Extension(state): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
    Path(todo_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = service(&state).await.toggle(&user, todo_id).await?;
    Ok(Json(todo))
}

/// DELETE /api/todos/:id - Remove a todo (owner or admin)
pub async fn delete_todo(
    Extension(state): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
    Path(todo_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    service(&state).await.delete(&user, todo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
