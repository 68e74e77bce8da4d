use async_trait::async_trait;

use crate::contract::User;

/// A user row together with its password hash. Never leaves the module.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

/// Port for the domain layer: persistence operations the domain needs.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Load a user and its hash by (normalized) email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<StoredUser>>;
    /// Check uniqueness by email.
    async fn email_exists(&self, email: &str) -> anyhow::Result<bool>;
    /// Insert a fully-formed user; the service computes id, hash and timestamps.
    async fn insert(&self, u: StoredUser) -> anyhow::Result<()>;
}
