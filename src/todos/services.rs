use super::models::{CreateTodoRequest, Todo};
use crate::auth::AuthedUser;
use crate::common::{ApiError, Validator};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub struct TodosService {
    db: SqlitePool,
}

impl TodosService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Admins get every todo, everyone else only their own.
    pub async fn list_for(&self, user: &AuthedUser) -> Result<Vec<Todo>, ApiError> {
        let todos = if user.is_admin() {
            sqlx::query_as::<_, Todo>("SELECT * FROM todos ORDER BY id ASC")
                .fetch_all(&self.db)
                .await?
        } else {
            sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE user_id = ? ORDER BY id ASC")
                .bind(&user.id)
                .fetch_all(&self.db)
                .await?
        };

        Ok(todos)
    }

    pub async fn create(
        &self,
        user: &AuthedUser,
        request: CreateTodoRequest,
    ) -> Result<Todo, ApiError> {
        request.validate().into_result()?;
        let text = request.text.unwrap_or_default().trim().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO todos (text, completed, user_id, username, created_at)
            VALUES (?, 0, ?, ?, ?)
            "#,
        )
        .bind(&text)
        .bind(&user.id)
        .bind(&user.username)
        .bind(&now)
        .execute(&self.db)
        .await?;

        let todo_id = result.last_insert_rowid();
        info!(todo_id = todo_id, user_id = %user.id, "Created todo");

        self.get(todo_id).await
    }

    pub async fn toggle(&self, user: &AuthedUser, todo_id: i64) -> Result<Todo, ApiError> {
        let todo = self.get(todo_id).await?;
        Self::check_access(user, &todo, "toggle")?;

        sqlx::query("UPDATE todos SET completed = 1 - completed WHERE id = ?")
            .bind(todo_id)
            .execute(&self.db)
            .await?;

        self.get(todo_id).await
    }

    pub async fn delete(&self, user: &AuthedUser, todo_id: i64) -> Result<(), ApiError> {
        let todo = self.get(todo_id).await?;
        Self::check_access(user, &todo, "delete")?;

        sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(todo_id)
            .execute(&self.db)
            .await?;

        info!(todo_id = todo_id, user_id = %user.id, "Deleted todo");
        Ok(())
    }

    async fn get(&self, todo_id: i64) -> Result<Todo, ApiError> {
        sqlx::query_as::<_, Todo>("SELECT * FROM todos WHERE id = ?")
            .bind(todo_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Todo not found".to_string()))
    }

    fn check_access(user: &AuthedUser, todo: &Todo, action: &str) -> Result<(), ApiError> {
        if user.is_admin() || todo.user_id == user.id {
            return Ok(());
        }
        warn!(
            todo_id = todo.id,
            owner = %todo.user_id,
            user_id = %user.id,
            action = %action,
            "Rejected access to another user's todo"
        );
        Err(ApiError::Forbidden(format!(
            "Forbidden: You can only {} your own todos",
            action
        )))
    }
}
