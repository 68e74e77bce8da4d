use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, Method},
    middleware::Next,
    response::Response,
};

use crate::body::{read_body, BodyKind, BodyLimit};
use crate::error::AppError;
use crate::session::Session;

/// Form/JSON field carrying the token.
pub const CSRF_FIELD: &str = "_csrf";

pub fn header() -> HeaderName {
    HeaderName::from_static("x-csrf-token")
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn tokens_match(expected: &str, provided: &str) -> bool {
    if expected.is_empty() || expected.len() != provided.len() {
        return false;
    }
    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn token_from_body(kind: BodyKind, raw: &[u8]) -> Option<String> {
    match kind {
        BodyKind::Form => url::form_urlencoded::parse(raw)
            .find(|(k, _)| k == CSRF_FIELD)
            .map(|(_, v)| v.into_owned()),
        BodyKind::Json => serde_json::from_slice::<serde_json::Value>(raw)
            .ok()?
            .get(CSRF_FIELD)?
            .as_str()
            .map(str::to_owned),
        BodyKind::Other => None,
    }
}

/// Pipeline interceptor: state-changing requests must echo the session's
/// CSRF token in the `x-csrf-token` header or the `_csrf` field.
pub async fn verify_csrf(
    State(limit): State<BodyLimit>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_state_changing(req.method()) {
        return Ok(next.run(req).await);
    }

    let session = req.extensions().get::<Session>().cloned().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("csrf check requires the session interceptor"))
    })?;
    let expected = session.csrf_token();

    let from_header = req
        .headers()
        .get(header())
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (req, provided) = match from_header {
        Some(token) => (req, Some(token)),
        None => {
            let (parts, body) = req.into_parts();
            let kind = BodyKind::of(&parts.headers);
            if kind == BodyKind::Other {
                (Request::from_parts(parts, body), None)
            } else {
                let raw = read_body(&parts.headers, body, limit).await?;
                let token = token_from_body(kind, &raw);
                (Request::from_parts(parts, Body::from(raw)), token)
            }
        }
    };

    match provided {
        Some(token) if tokens_match(&expected, &token) => Ok(next.run(req).await),
        _ => {
            tracing::warn!(method = %req.method(), path = %req.uri().path(), "csrf token rejected");
            Err(AppError::Forbidden("Invalid or missing CSRF token.".to_string()))
        }
    }
}
