use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use httpkit::{AppError, CleanPath, CurrentUser, Flash, PageContext, Session};
use tracing::info;

use crate::api::web::dto::{JobForm, JobPath};
use crate::api::web::views::{self, FormValues};
use crate::domain::error::DomainError;
use crate::domain::service::Service;

const JOBS: &str = "/jobs";

pub async fn list(
    Extension(svc): Extension<Arc<Service>>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Html<String>, AppError> {
    let jobs = svc.list_jobs(user.id).await.map_err(map_domain_error)?;
    Ok(views::list(&PageContext::from_session(&session), &jobs))
}

pub async fn new_form(session: Session) -> Html<String> {
    views::form(
        &PageContext::from_session(&session),
        "Add job",
        "/jobs/new",
        &FormValues::default(),
    )
}

pub async fn create(
    Extension(svc): Extension<Arc<Service>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Form(form): Form<JobForm>,
) -> Result<Response, AppError> {
    match svc.create_job(user.id, form.clone().into()).await {
        Ok(job) => {
            info!(job_id = %job.id, "job created");
            session.flash(Flash::info("Job added."));
            Ok(Redirect::to(JOBS).into_response())
        }
        Err(DomainError::Validation { errors }) => {
            for e in errors.iter() {
                session.flash(Flash::error(e.message.clone()));
            }
            Ok(rerender(&session, "Add job", "/jobs/new", &form))
        }
        Err(e) => Err(map_domain_error(e)),
    }
}

pub async fn edit_form(
    Extension(svc): Extension<Arc<Service>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    CleanPath(path): CleanPath<JobPath>,
) -> Result<Response, AppError> {
    match svc.get_job(user.id, &path.id).await {
        Ok(job) => {
            let ctx = PageContext::from_session(&session);
            let action = format!("/jobs/edit/{}", job.id);
            Ok(views::form(&ctx, "Edit job", &action, &FormValues::from(&job)).into_response())
        }
        Err(e) => not_found_or(e, &session),
    }
}

pub async fn update(
    Extension(svc): Extension<Arc<Service>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    CleanPath(path): CleanPath<JobPath>,
    Form(form): Form<JobForm>,
) -> Result<Response, AppError> {
    match svc.update_job(user.id, &path.id, form.clone().into()).await {
        Ok(job) => {
            info!(job_id = %job.id, "job updated");
            session.flash(Flash::info("Job updated."));
            Ok(Redirect::to(JOBS).into_response())
        }
        Err(DomainError::Validation { errors }) => {
            for e in errors.iter() {
                session.flash(Flash::error(e.message.clone()));
            }
            let action = format!("/jobs/edit/{}", path.id);
            Ok(rerender(&session, "Edit job", &action, &form))
        }
        Err(e) => not_found_or(e, &session),
    }
}

/// Deleting a job that is already gone only flashes the notice.
pub async fn delete(
    Extension(svc): Extension<Arc<Service>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    CleanPath(path): CleanPath<JobPath>,
) -> Result<Response, AppError> {
    match svc.delete_job(user.id, &path.id).await {
        Ok(()) => {
            info!(job_id = %path.id, "job deleted");
            session.flash(Flash::info("Job deleted."));
            Ok(Redirect::to(JOBS).into_response())
        }
        Err(e) => not_found_or(e, &session),
    }
}

fn rerender(session: &Session, title: &str, action: &str, form: &JobForm) -> Response {
    let ctx = PageContext::from_session(session);
    let values = FormValues {
        company: &form.company,
        position: &form.position,
        status: &form.status,
    };
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        views::form(&ctx, title, action, &values),
    )
        .into_response()
}

/// `NotFound` becomes a notice on the list page; anything else is fatal.
fn not_found_or(error: DomainError, session: &Session) -> Result<Response, AppError> {
    match error {
        DomainError::NotFound { .. } => {
            session.flash(Flash::error(error.to_string()));
            Ok(Redirect::to(JOBS).into_response())
        }
        other => Err(map_domain_error(other)),
    }
}

fn map_domain_error(error: DomainError) -> AppError {
    match error {
        DomainError::NotFound { .. } => AppError::NotFound(error.to_string()),
        DomainError::Validation { errors } => AppError::BadRequest(errors.to_string()),
        DomainError::Database { .. } => AppError::Internal(anyhow::Error::new(error)),
    }
}
