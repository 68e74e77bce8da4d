//! Page shell shared by all server-rendered pages.

use axum::response::Html;

use crate::csrf::CSRF_FIELD;
use crate::flash::Flash;
use crate::sanitize::escape_html;
use crate::session::{Session, SessionUser};

/// Per-request values every page needs.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<SessionUser>,
    pub csrf_token: String,
    pub flash: Vec<Flash>,
}

impl PageContext {
    /// Snapshot the session, consuming its pending flash messages.
    pub fn from_session(session: &Session) -> Self {
        Self {
            user: session.user(),
            csrf_token: session.csrf_token(),
            flash: session.take_flash(),
        }
    }

    /// Hidden input carrying the CSRF token, for forms that POST.
    pub fn csrf_input(&self) -> String {
        csrf_input(&self.csrf_token)
    }
}

pub fn csrf_input(token: &str) -> String {
    format!(
        r#"<input type="hidden" name="{CSRF_FIELD}" value="{}"/>"#,
        escape_html(token)
    )
}

fn nav(ctx: &PageContext) -> String {
    match &ctx.user {
        Some(user) => format!(
            r#"<nav><span>{name}</span> <a href="/jobs">Jobs</a>
<form method="post" action="/sessions/logoff" class="inline">{csrf}<button type="submit">Logoff</button></form></nav>"#,
            name = escape_html(&user.name),
            csrf = ctx.csrf_input(),
        ),
        None => r#"<nav><a href="/sessions/logon">Logon</a> <a href="/sessions/register">Register</a></nav>"#
            .to_string(),
    }
}

fn flash_block(flash: &[Flash]) -> String {
    if flash.is_empty() {
        return String::new();
    }
    let items: String = flash
        .iter()
        .map(|f| {
            format!(
                r#"<li class="flash-{}">{}</li>"#,
                f.kind.as_str(),
                escape_html(&f.message)
            )
        })
        .collect();
    format!(r#"<ul class="flash">{items}</ul>"#)
}

/// Wrap `body` (already escaped HTML) in the common page shell.
pub fn render_page(title: &str, ctx: &PageContext, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<title>{title} | Jobtrack</title>
</head>
<body>
<header><a href="/">Jobtrack</a> {nav}</header>
{flash}
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
        nav = nav(ctx),
        flash = flash_block(&ctx.flash),
    ))
}
