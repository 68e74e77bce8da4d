//! HTTP building blocks shared by the web modules: the request pipeline
//! (rate limit, security headers, sanitizer, session, CSRF), the
//! authentication guard, flash messages and the page layout.

pub mod auth;
pub mod body;
pub mod csrf;
pub mod error;
pub mod flash;
pub mod headers;
pub mod layout;
pub mod pipeline;
pub mod rate_limit;
pub mod sanitize;
pub mod session;
pub mod validation;

pub use auth::{require_user, CurrentUser};
pub use error::AppError;
pub use flash::{Flash, FlashKind};
pub use layout::{render_page, PageContext};
pub use pipeline::{Interceptor, Pipeline, ORDER};
pub use sanitize::{clean, escape_html, CleanPath};
pub use session::{Session, SessionStore, SessionUser};
pub use validation::{FieldError, FieldErrors};
