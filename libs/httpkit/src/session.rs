//! In-memory sessions keyed by a signed cookie.
//!
//! A session carries the logged-on user, the CSRF token and pending flash
//! messages. Sessions idle for longer than the store TTL are dropped on the
//! next access or by the periodic purge; sessions nobody has logged on to
//! get the shorter anonymous TTL. The session id changes on logon and logoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::flash::Flash;

pub const SESSION_COOKIE: &str = "jobtrack.sid";

/// Minimum secret length accepted for deriving the cookie signing key.
pub const MIN_SECRET_LEN: usize = 32;

const SESSION_ID_LEN: usize = 32;
const CSRF_TOKEN_LEN: usize = 32;

/// Idle limit for sessions without a logged-on user, capped by the store TTL.
pub const ANONYMOUS_TTL: Duration = Duration::from_secs(30 * 60);

/// The authenticated identity stored in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
struct SessionData {
    user: Option<SessionUser>,
    csrf_token: String,
    flash: Vec<Flash>,
    last_seen: Instant,
}

impl SessionData {
    fn new(now: Instant) -> Self {
        Self {
            user: None,
            csrf_token: nanoid::nanoid!(CSRF_TOKEN_LEN),
            flash: Vec::new(),
            last_seen: now,
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, SessionData>>,
    ttl: Duration,
    anonymous_ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
            anonymous_ttl: ttl.min(ANONYMOUS_TTL),
        }
    }

    pub fn with_anonymous_ttl(mut self, ttl: Duration) -> Self {
        self.anonymous_ttl = ttl.min(self.ttl);
        self
    }

    fn ttl_of(&self, data: &SessionData) -> Duration {
        if data.user.is_some() {
            self.ttl
        } else {
            self.anonymous_ttl
        }
    }

    pub fn create(&self) -> Session {
        let id = nanoid::nanoid!(SESSION_ID_LEN);
        self.inner.insert(id.clone(), SessionData::new(Instant::now()));
        tracing::trace!(sessions = self.inner.len(), "session created");
        Session {
            id: Arc::new(RwLock::new(id)),
            store: self.clone(),
        }
    }

    /// Move the data under `old` to a fresh id. `None` when `old` is gone.
    fn rekey(&self, old: &str) -> Option<String> {
        let (_, data) = self.inner.remove(old)?;
        let id = nanoid::nanoid!(SESSION_ID_LEN);
        self.inner.insert(id.clone(), data);
        Some(id)
    }

    /// Look up a live session and mark it as used.
    pub fn load(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        let expired = {
            let mut entry = self.inner.get_mut(id)?;
            if now.duration_since(entry.last_seen) >= self.ttl_of(&entry) {
                true
            } else {
                entry.last_seen = now;
                false
            }
        };
        if expired {
            self.inner.remove(id);
            return None;
        }
        Some(Session {
            id: Arc::new(RwLock::new(id.to_string())),
            store: self.clone(),
        })
    }

    /// Drop idle sessions; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner
            .retain(|_, data| now.duration_since(data.last_seen) < self.ttl_of(data));
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Handle to one session in the store. Cheap to clone; clones share the id,
/// so a rotation made by a handler is visible to the session interceptor.
///
/// Also an extractor: handlers take `Session` directly once the session
/// interceptor has run.
#[derive(Clone)]
pub struct Session {
    id: Arc<RwLock<String>>,
    store: SessionStore,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("user", &self.user()).finish()
    }
}

impl Session {
    pub fn id(&self) -> String {
        self.id.read().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> Option<R> {
        let id = self.id.read();
        self.store.inner.get_mut(id.as_str()).map(|mut d| f(d.value_mut()))
    }

    fn rotate_id(&self) {
        let mut id = self.id.write();
        if let Some(fresh) = self.store.rekey(&id) {
            *id = fresh;
        }
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.with(|d| d.user.clone()).flatten()
    }

    /// Empty when the session has been purged meanwhile; never matches a submitted token.
    pub fn csrf_token(&self) -> String {
        self.with(|d| d.csrf_token.clone()).unwrap_or_default()
    }

    pub fn log_in(&self, user: SessionUser) {
        self.rotate_id();
        self.with(|d| {
            d.user = Some(user);
            d.csrf_token = nanoid::nanoid!(CSRF_TOKEN_LEN);
        });
    }

    pub fn log_out(&self) {
        self.rotate_id();
        self.with(|d| {
            d.user = None;
            d.csrf_token = nanoid::nanoid!(CSRF_TOKEN_LEN);
        });
    }

    pub fn flash(&self, flash: Flash) {
        self.with(|d| d.flash.push(flash));
    }

    /// Pending messages, removed from the session.
    pub fn take_flash(&self) -> Vec<Flash> {
        self.with(|d| std::mem::take(&mut d.flash)).unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("session interceptor is not installed"))
            })
    }
}

/// State of the session interceptor.
#[derive(Clone)]
pub struct SessionLayerState {
    store: SessionStore,
    key: Key,
    secure: bool,
}

impl SessionLayerState {
    pub fn new(store: SessionStore, secret: &str, secure: bool) -> anyhow::Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "session secret must be at least {MIN_SECRET_LEN} bytes (got {})",
                secret.len()
            );
        }
        Ok(Self {
            store,
            key: Key::derive_from(secret.as_bytes()),
            secure,
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

/// Pipeline interceptor: resolves the session from the signed cookie, or
/// starts a new one. The cookie is (re)issued when the session is new or its
/// id was rotated while handling the request.
pub async fn load_session(
    State(state): State<SessionLayerState>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = SignedCookieJar::from_headers(req.headers(), state.key.clone());
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.store.load(c.value()));

    let (session, fresh) = match existing {
        Some(s) => (s, false),
        None => (state.store.create(), true),
    };
    let id_before = session.id();
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;
    let id = session.id();
    if !fresh && id == id_before {
        return response;
    }

    let cookie = Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.secure)
        .build();
    (jar.add(cookie), response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            name: "Ada".into(),
        }
    }

    #[test]
    fn log_in_and_out_rotate_csrf_token() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create();
        let t0 = session.csrf_token();
        assert_eq!(t0.len(), CSRF_TOKEN_LEN);
        assert!(session.user().is_none());

        let u = user();
        session.log_in(u.clone());
        let t1 = session.csrf_token();
        assert_eq!(session.user(), Some(u));
        assert_ne!(t0, t1);

        session.log_out();
        assert!(session.user().is_none());
        assert_ne!(session.csrf_token(), t1);
    }

    #[test]
    fn log_in_and_out_rotate_session_id() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create();
        let planted = session.id();
        session.flash(Flash::info("kept"));

        session.log_in(user());
        let authed = session.id();
        assert_ne!(authed, planted);
        assert!(store.load(&planted).is_none());
        assert!(store.load(&authed).unwrap().user().is_some());
        assert_eq!(session.take_flash(), vec![Flash::info("kept")]);
        assert_eq!(store.len(), 1);

        session.log_out();
        assert!(store.load(&authed).is_none());
        assert!(store.load(&session.id()).unwrap().user().is_none());
    }

    #[test]
    fn anonymous_sessions_expire_first() {
        let store = SessionStore::new(Duration::from_secs(60)).with_anonymous_ttl(Duration::ZERO);
        let anonymous = store.create();
        let authed = store.create();
        authed.log_in(user());

        assert_eq!(store.purge_expired(), 1);
        assert!(store.load(&anonymous.id()).is_none());
        assert!(store.load(&authed.id()).is_some());
    }

    #[test]
    fn anonymous_ttl_is_capped_by_store_ttl() {
        let store = SessionStore::new(Duration::from_secs(5));
        assert_eq!(store.anonymous_ttl, Duration::from_secs(5));
        let store = SessionStore::new(Duration::from_secs(24 * 60 * 60));
        assert_eq!(store.anonymous_ttl, ANONYMOUS_TTL);
    }

    #[test]
    fn flash_is_read_once() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create();
        session.flash(Flash::info("saved"));
        session.flash(Flash::error("oops"));

        let reloaded = store.load(&session.id()).unwrap();
        assert_eq!(
            reloaded.take_flash(),
            vec![Flash::info("saved"), Flash::error("oops")]
        );
        assert!(session.take_flash().is_empty());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let session = store.create();
        assert!(store.load(&session.id()).is_none());
        assert!(store.is_empty());

        store.create();
        store.create();
        assert_eq!(store.purge_expired(), 2);
    }

    #[test]
    fn purged_session_handle_degrades_gracefully() {
        let store = SessionStore::new(Duration::ZERO);
        let session = store.create();
        store.purge_expired();

        session.log_in(user());
        assert!(session.user().is_none());
        assert!(session.csrf_token().is_empty());
        assert!(session.take_flash().is_empty());
    }

    #[test]
    fn short_secret_is_rejected() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(SessionLayerState::new(store.clone(), "too-short", false).is_err());
        assert!(SessionLayerState::new(store, &"k".repeat(MIN_SECRET_LEN), false).is_ok());
    }
}
