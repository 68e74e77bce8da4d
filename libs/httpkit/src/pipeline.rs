//! The request pipeline: an explicit, ordered list of interceptors
//! wrapped around every application route.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware::from_fn_with_state, Router};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::body::BodyLimit;
use crate::csrf::verify_csrf;
use crate::headers::apply_security_headers;
use crate::rate_limit::{enforce_rate_limit, RateLimitPolicy, RateLimiter};
use crate::sanitize::sanitize_request;
use crate::session::{load_session, SessionLayerState, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interceptor {
    RateLimit,
    SecurityHeaders,
    Sanitize,
    Session,
    Csrf,
}

/// Outermost first: a request passes through these in order.
pub const ORDER: [Interceptor; 5] = [
    Interceptor::RateLimit,
    Interceptor::SecurityHeaders,
    Interceptor::Sanitize,
    Interceptor::Session,
    Interceptor::Csrf,
];

#[derive(Clone)]
pub struct Pipeline {
    limiter: Arc<RateLimiter>,
    sessions: SessionLayerState,
    body_limit: BodyLimit,
}

impl Pipeline {
    pub fn new(policy: RateLimitPolicy, sessions: SessionLayerState, body_limit: BodyLimit) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(policy)),
            sessions,
            body_limit,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        self.sessions.store()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Wrap `router` in every interceptor of [`ORDER`].
    pub fn apply(&self, router: Router) -> Router {
        // Router::layer wraps what is already there, so the innermost goes first.
        ORDER
            .iter()
            .rev()
            .fold(router, |router, interceptor| self.layer(*interceptor, router))
    }

    fn layer(&self, interceptor: Interceptor, router: Router) -> Router {
        match interceptor {
            Interceptor::RateLimit => {
                router.layer(from_fn_with_state(self.limiter.clone(), enforce_rate_limit))
            }
            Interceptor::SecurityHeaders => apply_security_headers(router),
            Interceptor::Sanitize => {
                router.layer(from_fn_with_state(self.body_limit, sanitize_request))
            }
            Interceptor::Session => {
                router.layer(from_fn_with_state(self.sessions.clone(), load_session))
            }
            Interceptor::Csrf => router.layer(from_fn_with_state(self.body_limit, verify_csrf)),
        }
    }

    /// Periodically purge expired sessions and rate-limit windows until `cancel` fires.
    pub fn spawn_janitor(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = self.limiter.clone();
        let sessions = self.sessions().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("janitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let sessions_purged = sessions.purge_expired();
                        let windows_purged = limiter.purge_expired();
                        if sessions_purged + windows_purged > 0 {
                            tracing::debug!(sessions_purged, windows_purged, "janitor pass");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_fixed() {
        assert_eq!(
            ORDER,
            [
                Interceptor::RateLimit,
                Interceptor::SecurityHeaders,
                Interceptor::Sanitize,
                Interceptor::Session,
                Interceptor::Csrf,
            ]
        );
    }

    #[tokio::test]
    async fn janitor_stops_on_cancel() {
        let sessions =
            SessionLayerState::new(SessionStore::new(Duration::ZERO), &"k".repeat(32), false)
                .unwrap();
        let pipeline = Pipeline::new(RateLimitPolicy::default(), sessions, BodyLimit::default());
        pipeline.sessions().create();

        let cancel = CancellationToken::new();
        let handle = pipeline.spawn_janitor(Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.sessions().is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
