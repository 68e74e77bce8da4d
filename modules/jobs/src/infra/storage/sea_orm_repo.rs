//! SeaORM-backed repository. Every statement filters on the owner column.

use anyhow::Context;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use crate::contract::Job;
use crate::domain::repo::JobsRepository;
use crate::infra::storage::entity::{ActiveModel as JobAM, Column, Entity as JobEntity};

pub struct SeaOrmJobsRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmJobsRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl<C> JobsRepository for SeaOrmJobsRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Job>> {
        let rows = JobEntity::find()
            .filter(Column::CreatedBy.eq(owner))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(&self.conn)
            .await
            .context("list_by_owner failed")?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Job>> {
        let found = JobEntity::find()
            .filter(Column::Id.eq(id))
            .filter(Column::CreatedBy.eq(owner))
            .one(&self.conn)
            .await
            .context("find_owned failed")?;
        found.map(Job::try_from).transpose()
    }

    async fn insert(&self, job: Job) -> anyhow::Result<()> {
        let m: JobAM = job.into();
        let _ = m.insert(&self.conn).await.context("insert failed")?;
        Ok(())
    }

    async fn update_owned(&self, job: &Job) -> anyhow::Result<bool> {
        let res = JobEntity::update_many()
            .col_expr(Column::Company, Expr::value(job.company.clone()))
            .col_expr(Column::Position, Expr::value(job.position.clone()))
            .col_expr(Column::Status, Expr::value(job.status.as_str()))
            .col_expr(Column::UpdatedAt, Expr::value(job.updated_at))
            .filter(Column::Id.eq(job.id))
            .filter(Column::CreatedBy.eq(job.created_by))
            .exec(&self.conn)
            .await
            .context("update_owned failed")?;
        Ok(res.rows_affected > 0)
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = JobEntity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::CreatedBy.eq(owner))
            .exec(&self.conn)
            .await
            .context("delete_owned failed")?;
        Ok(res.rows_affected > 0)
    }
}
