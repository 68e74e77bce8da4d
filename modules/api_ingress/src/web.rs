use axum::{
    http::{StatusCode, Uri},
    response::{Html, Json},
};
use httpkit::{escape_html, render_page, PageContext, Session};
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Fallback for unknown paths; runs inside the pipeline, so a session exists.
pub async fn not_found(session: Session, uri: Uri) -> (StatusCode, Html<String>) {
    tracing::debug!(path = %uri.path(), "no route");
    let ctx = PageContext::from_session(&session);
    let body = format!(
        "<p>The page <code>{}</code> does not exist.</p>",
        escape_html(uri.path())
    );
    (StatusCode::NOT_FOUND, render_page("Not found", &ctx, &body))
}
