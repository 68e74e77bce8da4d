use std::sync::Arc;

use chrono::Utc;
use httpkit::FieldErrors;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::contract::{Registration, User};
use crate::domain::error::DomainError;
use crate::domain::password::{hash_password, verify_password, MAX_PASSWORD_BYTES};
use crate::domain::repo::{StoredUser, UsersRepository};

/// Domain service for accounts.
/// Depends only on the repository port, not on infra types.
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn UsersRepository>,
    config: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bcrypt_cost: u32,
    pub min_password_len: usize,
    pub max_name_len: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            min_password_len: 8,
            max_name_len: 50,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

impl Service {
    pub fn new(repo: Arc<dyn UsersRepository>, config: ServiceConfig) -> Self {
        Self { repo, config }
    }

    #[instrument(name = "accounts.service.register", skip(self, reg), fields(email = %reg.email))]
    pub async fn register(&self, reg: Registration) -> Result<User, DomainError> {
        info!("Registering user");

        let email = normalize_email(&reg.email);
        let name = reg.name.trim().to_string();
        let mut errors = self.validate_registration(&name, &email, &reg);

        if errors.is_empty()
            && self
                .repo
                .email_exists(&email)
                .await
                .map_err(|e| DomainError::database(e.to_string()))?
        {
            errors.push("email", "That email is already registered.");
        }
        errors.into_result().map_err(DomainError::validation)?;

        let password_hash = hash_password(&reg.password, self.config.bcrypt_cost).await?;
        let user = User {
            id: Uuid::now_v7(),
            name,
            email,
            created_at: Utc::now(),
        };

        self.repo
            .insert(StoredUser {
                user: user.clone(),
                password_hash,
            })
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;

        info!(user_id = %user.id, "Successfully registered user");
        Ok(user)
    }

    #[instrument(name = "accounts.service.authenticate", skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, DomainError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(DomainError::InvalidCredentials);
        }

        let Some(stored) = self
            .repo
            .find_by_email(&email)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?
        else {
            debug!("unknown email");
            return Err(DomainError::InvalidCredentials);
        };

        if !verify_password(password, &stored.password_hash).await? {
            debug!("password mismatch");
            return Err(DomainError::InvalidCredentials);
        }

        info!(user_id = %stored.user.id, "User authenticated");
        Ok(stored.user)
    }

    fn validate_registration(&self, name: &str, email: &str, reg: &Registration) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if name.is_empty() {
            errors.push("name", "Please provide name");
        } else if name.chars().count() > self.config.max_name_len {
            errors.push(
                "name",
                format!("Name must be at most {} characters", self.config.max_name_len),
            );
        }

        if email.is_empty() {
            errors.push("email", "Please provide email");
        } else if !looks_like_email(email) {
            errors.push("email", "Please provide a valid email");
        }

        if reg.password.chars().count() < self.config.min_password_len {
            errors.push(
                "password",
                format!(
                    "Password must be at least {} characters",
                    self.config.min_password_len
                ),
            );
        } else if reg.password.len() > MAX_PASSWORD_BYTES {
            errors.push(
                "password",
                format!("Password must be at most {MAX_PASSWORD_BYTES} bytes"),
            );
        } else if reg.password != reg.password1 {
            errors.push("password1", "The passwords entered do not match.");
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        for ok in ["a@b.co", "first.last@sub.example.org"] {
            assert!(looks_like_email(ok), "{ok}");
        }
        for bad in ["", "a", "a@", "@b.co", "a@b", "a@b.", "a@@b.co", "a b@c.de", "a@.co"] {
            assert!(!looks_like_email(bad), "{bad}");
        }
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
