use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::api::web::handlers;
use crate::domain::service::Service;

/// Index and session routes; all public.
pub fn register_routes(router: Router, service: Arc<Service>) -> Router {
    router
        .route("/", get(handlers::index))
        .route(
            "/sessions/register",
            get(handlers::register_form).post(handlers::register),
        )
        .route(
            "/sessions/logon",
            get(handlers::logon_form).post(handlers::logon),
        )
        .route("/sessions/logoff", post(handlers::logoff))
        .layer(Extension(service))
}
