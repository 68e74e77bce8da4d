use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use httpkit::{AppError, Flash, PageContext, Session, SessionUser};
use tracing::{info, warn};

use crate::api::web::dto::{LogonForm, RegisterForm};
use crate::api::web::views;
use crate::domain::error::DomainError;
use crate::domain::service::Service;

pub async fn index(session: Session) -> Html<String> {
    views::index(&PageContext::from_session(&session))
}

pub async fn register_form(session: Session) -> Html<String> {
    views::register(&PageContext::from_session(&session), "", "")
}

pub async fn register(
    Extension(svc): Extension<Arc<Service>>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let (name, email) = (form.name.clone(), form.email.clone());

    match svc.register(form.into()).await {
        Ok(user) => {
            session.log_in(SessionUser {
                id: user.id,
                name: user.name.clone(),
            });
            session.flash(Flash::info(format!("Welcome, {}!", user.name)));
            Ok(Redirect::to("/").into_response())
        }
        Err(DomainError::Validation { errors }) => {
            for e in errors.iter() {
                session.flash(Flash::error(e.message.clone()));
            }
            let ctx = PageContext::from_session(&session);
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                views::register(&ctx, &name, &email),
            )
                .into_response())
        }
        Err(e) => Err(map_domain_error(e)),
    }
}

pub async fn logon_form(session: Session) -> Html<String> {
    views::logon(&PageContext::from_session(&session), "")
}

pub async fn logon(
    Extension(svc): Extension<Arc<Service>>,
    session: Session,
    Form(form): Form<LogonForm>,
) -> Result<Response, AppError> {
    match svc.authenticate(&form.email, &form.password).await {
        Ok(user) => {
            info!(user_id = %user.id, "logon");
            session.log_in(SessionUser {
                id: user.id,
                name: user.name,
            });
            Ok(Redirect::to("/").into_response())
        }
        Err(e @ DomainError::InvalidCredentials) => {
            warn!("logon rejected");
            session.flash(Flash::error(e.to_string()));
            Ok(Redirect::to("/sessions/logon").into_response())
        }
        Err(e) => Err(map_domain_error(e)),
    }
}

pub async fn logoff(session: Session) -> Redirect {
    session.log_out();
    Redirect::to("/")
}

/// Errors the handlers do not render themselves.
fn map_domain_error(error: DomainError) -> AppError {
    match error {
        DomainError::Validation { errors } => AppError::BadRequest(errors.to_string()),
        DomainError::InvalidCredentials => AppError::Forbidden(error.to_string()),
        DomainError::Database { .. } | DomainError::Hashing { .. } => {
            AppError::Internal(anyhow::Error::new(error))
        }
    }
}
