use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::Job;

/// Port for the domain layer. Every query is scoped by the owning user id.
#[async_trait]
pub trait JobsRepository: Send + Sync {
    /// All jobs of `owner`, oldest first.
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Job>>;
    /// The job with `id` if `owner` owns it.
    async fn find_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Job>>;
    /// Insert a fully-formed job; the service computes id, owner and timestamps.
    async fn insert(&self, job: Job) -> anyhow::Result<()>;
    /// Write the mutable fields of `job`, matching on id and owner. `false` when no row matched.
    async fn update_owned(&self, job: &Job) -> anyhow::Result<bool>;
    /// `false` when no row matched.
    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}
