use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue},
};

use crate::error::AppError;

/// Upper bound for buffering a request body inside the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct BodyLimit(pub usize);

impl Default for BodyLimit {
    fn default() -> Self {
        Self(1024 * 1024)
    }
}

/// The body encodings the pipeline understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Form,
    Json,
    Other,
}

impl BodyKind {
    pub fn of(headers: &HeaderMap) -> Self {
        let Some(ct) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        else {
            return BodyKind::Other;
        };
        let mime = ct
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/x-www-form-urlencoded" => BodyKind::Form,
            m if m == "application/json" || m.ends_with("+json") => BodyKind::Json,
            _ => BodyKind::Other,
        }
    }
}

/// Buffer a request body, enforcing `limit`.
pub async fn read_body(headers: &HeaderMap, body: Body, limit: BodyLimit) -> Result<Bytes, AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit.0) {
        return Err(AppError::PayloadTooLarge);
    }

    // Buffering fails on overflow or a dropped client; the latter never sees the response.
    axum::body::to_bytes(body, limit.0)
        .await
        .map_err(|_| AppError::PayloadTooLarge)
}

/// Replace the body bytes and keep `content-length` consistent with them.
pub fn replace_body(headers: &mut HeaderMap, bytes: Vec<u8>) -> Body {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    Body::from(bytes)
}
