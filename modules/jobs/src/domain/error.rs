use httpkit::FieldErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Missing, or owned by another user.
    #[error("Id {id} not found.")]
    NotFound { id: String },

    #[error("Validation failed: {errors}")]
    Validation { errors: FieldErrors },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation { errors }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_notice() {
        assert_eq!(DomainError::not_found("abc").to_string(), "Id abc not found.");
    }
}
