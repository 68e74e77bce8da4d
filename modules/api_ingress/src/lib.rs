//! HTTP host: wraps the application routes in the request pipeline and the
//! infrastructure layers (request id, tracing, timeout, body limit), then
//! serves them until cancelled.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{middleware::from_fn, routing::get, Router};
use httpkit::Pipeline;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

mod config;
pub mod request_id;
pub mod shutdown;
mod web;

pub use config::ApiIngressConfig;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiIngress {
    config: ApiIngressConfig,
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApiIngressConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        match self.config.timeout_sec {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Compose the served router: `/health` stays outside the pipeline,
    /// everything else (including the 404 fallback) runs through it.
    pub fn build_router(&self, routes: Router, pipeline: &Pipeline) -> Router {
        tracing::debug!("Building router");
        let app = pipeline.apply(routes.fallback(web::not_found));

        let mut router = Router::new()
            .route("/health", get(web::health_check))
            .merge(app);

        // Added innermost first. Request order (outermost to innermost):
        // PropagateRequestId -> SetRequestId -> Trace -> push_req_id_to_extensions -> Timeout -> BodyLimit
        router = router.layer(RequestBodyLimitLayer::new(self.config.max_body_bytes));
        router = router.layer(TimeoutLayer::new(self.timeout()));
        router = router.layer(from_fn(request_id::push_req_id_to_extensions));
        router = router.layer(request_id::create_trace_layer());

        let x_request_id = request_id::header();
        router = router.layer(SetRequestIdLayer::new(
            x_request_id.clone(),
            request_id::MakeReqId,
        ));
        router = router.layer(PropagateRequestIdLayer::new(x_request_id));

        router
    }

    /// Bind `bind_addr` and serve until `cancel` fires.
    pub async fn serve(&self, router: Router, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.config.bind_addr))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        serve_listener(listener, router, cancel).await
    }
}

/// Serve on an already bound listener; client addresses reach the
/// rate limiter through `ConnectInfo`.
pub async fn serve_listener(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("HTTP server bound on {}", addr);

    let shutdown = async move {
        cancel.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully (cancellation)");
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("HTTP server failed")
}
