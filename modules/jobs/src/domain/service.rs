use std::sync::Arc;

use chrono::Utc;
use httpkit::FieldErrors;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::contract::{Job, JobPatch, JobStatus, NewJob};
use crate::domain::error::DomainError;
use crate::domain::repo::JobsRepository;

/// Domain service for jobs.
///
/// Every operation takes the id of the logged-on user and only ever sees
/// that user's jobs. Persistence failures come back as [`DomainError::Database`].
#[derive(Clone)]
pub struct Service {
    repo: Arc<dyn JobsRepository>,
    config: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_company_len: usize,
    pub max_position_len: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_company_len: 50,
            max_position_len: 100,
        }
    }
}

/// Ids that do not parse are reported like ids that do not exist.
fn parse_id(id: &str) -> Result<Uuid, DomainError> {
    Uuid::parse_str(id).map_err(|_| DomainError::not_found(id))
}

impl Service {
    pub fn new(repo: Arc<dyn JobsRepository>, config: ServiceConfig) -> Self {
        Self { repo, config }
    }

    #[instrument(name = "jobs.service.list_jobs", skip(self), fields(owner = %owner))]
    pub async fn list_jobs(&self, owner: Uuid) -> Result<Vec<Job>, DomainError> {
        let jobs = self
            .repo
            .list_by_owner(owner)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;
        debug!("Listed {} jobs", jobs.len());
        Ok(jobs)
    }

    #[instrument(name = "jobs.service.get_job", skip(self), fields(owner = %owner))]
    pub async fn get_job(&self, owner: Uuid, id: &str) -> Result<Job, DomainError> {
        let job_id = parse_id(id)?;
        self.repo
            .find_owned(owner, job_id)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?
            .ok_or_else(|| DomainError::not_found(id))
    }

    #[instrument(
        name = "jobs.service.create_job",
        skip(self, new_job),
        fields(owner = %owner, company = %new_job.company)
    )]
    pub async fn create_job(&self, owner: Uuid, new_job: NewJob) -> Result<Job, DomainError> {
        info!("Creating job");

        let mut errors = FieldErrors::new();
        let company = self.check_company(&new_job.company, &mut errors);
        let position = self.check_position(&new_job.position, &mut errors);
        let status = check_status(new_job.status.as_deref(), &mut errors);
        errors.into_result().map_err(DomainError::validation)?;

        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            company,
            position,
            status: status.unwrap_or_default(),
            created_by: owner,
            created_at: now,
            updated_at: now,
        };

        self.repo
            .insert(job.clone())
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;

        info!(job_id = %job.id, "Successfully created job");
        Ok(job)
    }

    #[instrument(name = "jobs.service.update_job", skip(self, patch), fields(owner = %owner))]
    pub async fn update_job(
        &self,
        owner: Uuid,
        id: &str,
        patch: JobPatch,
    ) -> Result<Job, DomainError> {
        info!("Updating job");

        let mut current = self.get_job(owner, id).await?;

        let mut errors = FieldErrors::new();
        let company = patch
            .company
            .map(|c| self.check_company(&c, &mut errors));
        let position = patch
            .position
            .map(|p| self.check_position(&p, &mut errors));
        let status = check_status(patch.status.as_deref(), &mut errors);
        errors.into_result().map_err(DomainError::validation)?;

        if let Some(company) = company {
            current.company = company;
        }
        if let Some(position) = position {
            current.position = position;
        }
        if let Some(status) = status {
            current.status = status;
        }
        current.updated_at = Utc::now();

        let matched = self
            .repo
            .update_owned(&current)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;
        if !matched {
            // deleted between the read and the write
            return Err(DomainError::not_found(id));
        }

        info!(job_id = %current.id, "Successfully updated job");
        Ok(current)
    }

    #[instrument(name = "jobs.service.delete_job", skip(self), fields(owner = %owner))]
    pub async fn delete_job(&self, owner: Uuid, id: &str) -> Result<(), DomainError> {
        info!("Deleting job");

        let job_id = parse_id(id)?;
        let deleted = self
            .repo
            .delete_owned(owner, job_id)
            .await
            .map_err(|e| DomainError::database(e.to_string()))?;

        if !deleted {
            return Err(DomainError::not_found(id));
        }

        info!("Successfully deleted job");
        Ok(())
    }

    // --- validation helpers ---

    fn check_company(&self, company: &str, errors: &mut FieldErrors) -> String {
        check_text(company, "company", "Company", self.config.max_company_len, errors)
    }

    fn check_position(&self, position: &str, errors: &mut FieldErrors) -> String {
        check_text(position, "position", "Position", self.config.max_position_len, errors)
    }
}

/// Trimmed `value`; records a field error when it is blank or longer than `max_len`.
fn check_text(
    value: &str,
    field: &'static str,
    label: &str,
    max_len: usize,
    errors: &mut FieldErrors,
) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(field, format!("Please provide {field}"));
    } else if value.chars().count() > max_len {
        errors.push(field, format!("{label} must be at most {max_len} characters"));
    }
    value.to_string()
}

/// Blank means "not given".
fn check_status(status: Option<&str>, errors: &mut FieldErrors) -> Option<JobStatus> {
    let status = status.map(str::trim).filter(|s| !s.is_empty())?;
    match status.parse() {
        Ok(st) => Some(st),
        Err(_) => {
            errors.push("status", "Please provide a valid status");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_checks() {
        let mut errors = FieldErrors::new();
        assert_eq!(check_text("  Acme ", "company", "Company", 50, &mut errors), "Acme");
        assert!(errors.is_empty());

        check_text("   ", "company", "Company", 50, &mut errors);
        check_text(&"x".repeat(101), "position", "Position", 100, &mut errors);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            ["Please provide company", "Position must be at most 100 characters"]
        );
    }

    #[test]
    fn status_checks() {
        let mut errors = FieldErrors::new();
        assert_eq!(check_status(None, &mut errors), None);
        assert_eq!(check_status(Some(" "), &mut errors), None);
        assert_eq!(
            check_status(Some("interview"), &mut errors),
            Some(JobStatus::Interview)
        );
        assert!(errors.is_empty());

        assert_eq!(check_status(Some("hired"), &mut errors), None);
        assert!(errors.has("status"));
    }

    #[test]
    fn unparsable_id_is_not_found() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(err.to_string(), "Id not-a-uuid not found.");
    }
}
