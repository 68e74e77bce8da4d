//! Per-client fixed-window rate limiter
//!
//! Each client address gets a window of `window` length; the window opens
//! on the first request and allows `max_requests` hits before further
//! requests are refused until it elapses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
    /// Key clients by the first `x-forwarded-for` hop instead of the socket address.
    pub trust_proxy: bool,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 100,
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    policy: RateLimitPolicy,
    /// Client key -> current window
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Count one request from `key`.
    #[inline]
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        let window = entry.value_mut();

        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.policy.window {
            window.started = now;
            window.hits = 0;
        }

        if window.hits >= self.policy.max_requests {
            let retry_after = self
                .policy
                .window
                .saturating_sub(now.saturating_duration_since(window.started));
            return Decision::Limited { retry_after };
        }

        window.hits += 1;
        Decision::Allowed {
            remaining: self.policy.max_requests - window.hits,
        }
    }

    /// Drop windows that have fully elapsed; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.policy.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn remaining_header() -> HeaderName {
    HeaderName::from_static("x-ratelimit-remaining")
}

/// Pipeline interceptor: refuses clients over their request budget with 429.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, limiter.policy().trust_proxy);

    match limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut resp = next.run(req).await;
            resp.headers_mut()
                .insert(remaining_header(), HeaderValue::from(remaining));
            Ok(resp)
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %key, "rate limit exceeded");
            // round up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            Err(AppError::TooManyRequests {
                retry_after_secs: secs.max(1),
            })
        }
    }
}
