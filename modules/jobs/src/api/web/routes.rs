use std::sync::Arc;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Extension, Router,
};
use httpkit::require_user;

use crate::api::web::handlers;
use crate::domain::service::Service;

/// The `/jobs` routes. All of them require a logged-on user; the guard runs
/// before any extractor of the matched handler.
pub fn register_routes(router: Router, service: Arc<Service>) -> Router {
    let jobs = Router::new()
        .route("/jobs", get(handlers::list))
        .route("/jobs/new", get(handlers::new_form).post(handlers::create))
        .route(
            "/jobs/edit/{id}",
            get(handlers::edit_form).post(handlers::update),
        )
        .route("/jobs/delete/{id}", post(handlers::delete))
        .route_layer(from_fn(require_user))
        .layer(Extension(service));

    router.merge(jobs)
}
