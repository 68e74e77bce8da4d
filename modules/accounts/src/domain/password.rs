//! bcrypt hashing, run on the blocking pool so the runtime threads stay free.

use crate::domain::error::DomainError;

/// bcrypt only looks at the first 72 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

pub async fn hash_password(password: &str, cost: u32) -> Result<String, DomainError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, cost).map_err(|e| DomainError::hashing(e.to_string()))
    })
    .await
    .map_err(|e| DomainError::hashing(format!("Task join error: {e}")))?
}

/// `Ok(false)` on mismatch; `Err` only when the hash itself is unusable.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, DomainError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hash).map_err(|e| DomainError::hashing(e.to_string()))
    })
    .await
    .map_err(|e| DomainError::hashing(format!("Task join error: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("correct horse", 4).await.unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-bcrypt-hash").await,
            Err(DomainError::Hashing { .. })
        ));
    }
}
