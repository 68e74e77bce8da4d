use httpkit::FieldErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation failed: {errors}")]
    Validation { errors: FieldErrors },

    /// Unknown email and wrong password are deliberately indistinguishable.
    #[error("Incorrect email or password.")]
    InvalidCredentials,

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Password hashing error: {message}")]
    Hashing { message: String },
}

impl DomainError {
    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation { errors }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn hashing(message: impl Into<String>) -> Self {
        Self::Hashing {
            message: message.into(),
        }
    }
}
