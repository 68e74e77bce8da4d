use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::sanitize::escape_html;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("rate limited, retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthenticationRequired => StatusCode::SEE_OTHER,
            Forbidden(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Minimal standalone page for errors raised outside a handler's own rendering.
fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"/><title>{code} {title}</title></head>\n\
         <body>\n<h1>{code} {title}</h1>\n<p>{message}</p>\n<p><a href=\"/\">Home</a></p>\n</body>\n</html>",
        code = status.as_u16(),
        message = escape_html(message),
    ))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use AppError::*;

        let status = self.status();
        match &self {
            Internal(err) => tracing::error!(
                error = ?err,
                status = status.as_u16(),
                "request failed"
            ),
            AuthenticationRequired => tracing::debug!("authentication required, redirecting"),
            other => tracing::warn!(
                error = %other,
                status = status.as_u16(),
                "request failed"
            ),
        }

        match self {
            AuthenticationRequired => Redirect::to("/").into_response(),
            TooManyRequests { retry_after_secs } => {
                let mut resp = (
                    status,
                    error_page(status, "Too many requests, please try again later."),
                )
                    .into_response();
                resp.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                resp
            }
            // never leak internal details to the client
            Internal(_) => (status, error_page(status, "Something went wrong.")).into_response(),
            other => {
                let message = other.to_string();
                (status, error_page(status, &message)).into_response()
            }
        }
    }
}
