// Request validation types and traits

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Accumulates field errors; valid until the first error is added.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Converts into `Err` carrying the joined messages when any error was recorded.
    pub fn into_result(self) -> Result<(), super::ApiError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

pub trait Validator {
    fn validate(&self) -> ValidationResult;
}
