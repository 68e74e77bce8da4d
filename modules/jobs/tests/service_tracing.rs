//! Service methods run under their instrumented spans against a mock repository.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing_test::traced_test;
use uuid::Uuid;

use jobs::contract::{Job, JobPatch, NewJob};
use jobs::domain::error::DomainError;
use jobs::domain::repo::JobsRepository;
use jobs::domain::service::{Service, ServiceConfig};

// In-memory repository for testing
#[derive(Default)]
struct MockJobsRepository {
    jobs: Mutex<Vec<Job>>,
}

#[async_trait::async_trait]
impl JobsRepository for MockJobsRepository {
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .iter()
            .filter(|j| j.created_by == owner)
            .cloned()
            .collect())
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .iter()
            .find(|j| j.id == id && j.created_by == owner)
            .cloned())
    }

    async fn insert(&self, job: Job) -> Result<()> {
        self.jobs.lock().push(job);
        Ok(())
    }

    async fn update_owned(&self, job: &Job) -> Result<bool> {
        let mut jobs = self.jobs.lock();
        match jobs
            .iter_mut()
            .find(|j| j.id == job.id && j.created_by == job.created_by)
        {
            Some(slot) => {
                *slot = job.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|j| !(j.id == id && j.created_by == owner));
        Ok(jobs.len() < before)
    }
}

// Repository that finds a row but loses it before the write
struct VanishingRepository(Job);

#[async_trait::async_trait]
impl JobsRepository for VanishingRepository {
    async fn list_by_owner(&self, _owner: Uuid) -> Result<Vec<Job>> {
        anyhow::bail!("disk I/O error")
    }

    async fn find_owned(&self, _owner: Uuid, _id: Uuid) -> Result<Option<Job>> {
        Ok(Some(self.0.clone()))
    }

    async fn insert(&self, _job: Job) -> Result<()> {
        anyhow::bail!("disk I/O error")
    }

    async fn update_owned(&self, _job: &Job) -> Result<bool> {
        Ok(false)
    }

    async fn delete_owned(&self, _owner: Uuid, _id: Uuid) -> Result<bool> {
        Ok(false)
    }
}

fn acme() -> NewJob {
    NewJob {
        company: "Acme".into(),
        position: "Eng".into(),
        status: None,
    }
}

#[traced_test]
#[tokio::test]
async fn crud_emits_spans() {
    let svc = Service::new(Arc::new(MockJobsRepository::default()), ServiceConfig::default());
    let uid = Uuid::now_v7();

    let job = svc.create_job(uid, acme()).await.unwrap();
    let id = job.id.to_string();
    assert_eq!(svc.list_jobs(uid).await.unwrap().len(), 1);

    let updated = svc
        .update_job(
            uid,
            &id,
            JobPatch {
                position: Some("Staff Eng".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.position, "Staff Eng");

    svc.delete_job(uid, &id).await.unwrap();
    assert!(svc.list_jobs(uid).await.unwrap().is_empty());
}

#[traced_test]
#[tokio::test]
async fn lost_update_is_not_found() {
    let uid = Uuid::now_v7();
    let now = chrono::Utc::now();
    let job = Job {
        id: Uuid::now_v7(),
        company: "Acme".into(),
        position: "Eng".into(),
        status: Default::default(),
        created_by: uid,
        created_at: now,
        updated_at: now,
    };
    let svc = Service::new(Arc::new(VanishingRepository(job.clone())), ServiceConfig::default());

    let err = svc
        .update_job(uid, &job.id.to_string(), JobPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[traced_test]
#[tokio::test]
async fn repository_failures_surface_as_database_errors() {
    let now = chrono::Utc::now();
    let job = Job {
        id: Uuid::now_v7(),
        company: "Acme".into(),
        position: "Eng".into(),
        status: Default::default(),
        created_by: Uuid::now_v7(),
        created_at: now,
        updated_at: now,
    };
    let svc = Service::new(Arc::new(VanishingRepository(job)), ServiceConfig::default());

    assert!(matches!(
        svc.list_jobs(Uuid::now_v7()).await,
        Err(DomainError::Database { .. })
    ));
    assert!(matches!(
        svc.create_job(Uuid::now_v7(), acme()).await,
        Err(DomainError::Database { .. })
    ));
}
