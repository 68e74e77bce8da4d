//! Input sanitizer.
//!
//! Every string leaf of user input (query string, form or JSON body, route
//! parameters) is HTML-escaped and trimmed before any handler sees it.
//! Escaping leaves existing character references alone, so cleaning is
//! idempotent and values may safely be escaped again on output.

use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, Request},
    http::{request::Parts, uri::PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::body::{read_body, replace_body, BodyKind, BodyLimit};
use crate::error::AppError;

const MAX_ENTITY_NAME_LEN: usize = 32;

/// HTML-escape `< > & " '`, keeping `&` that already starts a character reference.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, ch) in input.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '&' if starts_char_ref(&input[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}

/// `s` starts with `&`; true when it continues as `&name;`, `&#123;` or `&#x1F;`.
fn starts_char_ref(s: &str) -> bool {
    let rest = &s[1..];
    let Some(end) = rest.find(';') else {
        return false;
    };
    let body = &rest[..end];

    if let Some(num) = body.strip_prefix('#') {
        return match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        };
    }

    !body.is_empty()
        && body.len() <= MAX_ENTITY_NAME_LEN
        && body.starts_with(|c: char| c.is_ascii_alphabetic())
        && body.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Escape then trim a single string.
pub fn clean_str(input: &str) -> String {
    escape_html(input).trim().to_string()
}

/// Recursively clean a structured value. Keys are kept verbatim; numbers,
/// booleans and null pass through unchanged.
pub fn clean(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clean(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

fn clean_urlencoded(raw: &[u8]) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in url::form_urlencoded::parse(raw) {
        ser.append_pair(&k, &clean_str(&v));
    }
    ser.finish()
}

fn clean_query(uri: &Uri) -> Result<Uri, AppError> {
    let Some(query) = uri.query() else {
        return Ok(uri.clone());
    };
    let cleaned = clean_urlencoded(query.as_bytes());
    let pq = if cleaned.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), cleaned)
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        pq.parse::<PathAndQuery>()
            .map_err(|e| AppError::BadRequest(format!("invalid query string: {e}")))?,
    );
    Uri::from_parts(parts).map_err(|e| AppError::BadRequest(format!("invalid uri: {e}")))
}

/// Pipeline interceptor: cleans the query string and form/JSON bodies.
pub async fn sanitize_request(
    axum::extract::State(limit): axum::extract::State<BodyLimit>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    parts.uri = clean_query(&parts.uri)?;

    let body = match BodyKind::of(&parts.headers) {
        BodyKind::Form => {
            let raw = read_body(&parts.headers, body, limit).await?;
            replace_body(&mut parts.headers, clean_urlencoded(&raw).into_bytes())
        }
        BodyKind::Json => {
            let raw = read_body(&parts.headers, body, limit).await?;
            if raw.is_empty() {
                Body::empty()
            } else {
                let value: Value = serde_json::from_slice(&raw)
                    .map_err(|e| AppError::BadRequest(format!("malformed JSON body: {e}")))?;
                let bytes = serde_json::to_vec(&clean(value))
                    .map_err(|e| AppError::Internal(e.into()))?;
                replace_body(&mut parts.headers, bytes)
            }
        }
        BodyKind::Other => body,
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Route parameters, cleaned and then deserialized into `T`.
#[derive(Debug, Clone)]
pub struct CleanPath<T>(pub T);

impl<S, T> FromRequestParts<S> for CleanPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = RawPathParams::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let map = raw
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect::<Map<String, Value>>();

        serde_json::from_value(clean(Value::Object(map)))
            .map(CleanPath)
            .map_err(|e| AppError::BadRequest(format!("invalid path parameters: {e}")))
    }
}
