use anyhow::Context;
use sea_orm::Set;

use crate::contract::Job;
use crate::infra::storage::entity::{ActiveModel, Model};

impl TryFrom<Model> for Job {
    type Error = anyhow::Error;

    fn try_from(m: Model) -> Result<Self, Self::Error> {
        let status = m
            .status
            .parse()
            .with_context(|| format!("job {} has a corrupt status", m.id))?;
        Ok(Self {
            id: m.id,
            company: m.company,
            position: m.position,
            status,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl From<Job> for ActiveModel {
    fn from(j: Job) -> Self {
        Self {
            id: Set(j.id),
            company: Set(j.company),
            position: Set(j.position),
            status: Set(j.status.as_str().to_string()),
            created_by: Set(j.created_by),
            created_at: Set(j.created_at),
            updated_at: Set(j.updated_at),
        }
    }
}
