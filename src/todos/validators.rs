use super::models::CreateTodoRequest;
use crate::common::{ValidationResult, Validator};

pub const MAX_TODO_LENGTH: usize = 500;

impl Validator for CreateTodoRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        match &self.text {
            None => result.add_error("text", "Missing required field: text"),
            Some(text) if text.trim().is_empty() => {
                result.add_error("text", "Todo text cannot be empty")
            }
            Some(text) if text.trim().chars().count() > MAX_TODO_LENGTH => result.add_error(
                "text",
                &format!("Todo text must not exceed {} characters", MAX_TODO_LENGTH),
            ),
            Some(_) => {}
        }

        result
    }
}
