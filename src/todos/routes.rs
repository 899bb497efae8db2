use super::handlers;
use axum::{
    routing::{delete, get, put},
    Router,
};

/// Creates the todos router
pub fn todos_routes() -> Router {
    Router::new()
        .route(
            "/api/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route("/api/todos/:id/toggle", put(handlers::toggle_todo))
        .route("/api/todos/:id", delete(handlers::delete_todo))
}
