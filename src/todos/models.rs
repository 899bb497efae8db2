use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;

fn serialize_int_as_bool<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_bool(*value != 0)
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct Todo {
    pub id: i64,
    pub text: String,
    #[serde(serialize_with = "serialize_int_as_bool")]
    pub completed: i64,
    pub user_id: String, // token `sub` of the owner
    pub username: String,
    pub created_at: String,
}

impl Todo {
    pub fn is_completed(&self) -> bool {
        self.completed != 0
    }
}

/// `text` is optional here so a missing field can be reported as such.
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: Option<String>,
}
