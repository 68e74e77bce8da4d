use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::flash::Flash;
use crate::session::{Session, SessionUser};

pub const LOGON_REQUIRED: &str = "You can't access that page before logon.";

/// The logged-on user of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        session
            .user()
            .map(CurrentUser)
            .ok_or(AppError::AuthenticationRequired)
    }
}

/// Route guard: anonymous requests get a flash and a redirect to `/`
/// before any extractor or handler of the guarded routes runs.
pub async fn require_user(session: Session, req: Request, next: Next) -> Result<Response, AppError> {
    if session.user().is_none() {
        session.flash(Flash::error(LOGON_REQUIRED));
        return Err(AppError::AuthenticationRequired);
    }
    Ok(next.run(req).await)
}
