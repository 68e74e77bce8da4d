use axum::response::Html;
use httpkit::{escape_html, render_page, PageContext};

pub fn index(ctx: &PageContext) -> Html<String> {
    let body = match &ctx.user {
        Some(user) => format!(
            r#"<p>Welcome back, {}.</p><p><a href="/jobs">Go to your jobs</a></p>"#,
            escape_html(&user.name)
        ),
        None => r#"<p>Keep track of the jobs you applied for.</p>
<p><a href="/sessions/logon">Logon</a> or <a href="/sessions/register">create an account</a>.</p>"#
            .to_string(),
    };
    render_page("Jobtrack", ctx, &body)
}

pub fn register(ctx: &PageContext, name: &str, email: &str) -> Html<String> {
    let body = format!(
        r#"<form method="post" action="/sessions/register">
{csrf}
<label>Name <input name="name" value="{name}" maxlength="50"/></label>
<label>Email <input name="email" type="email" value="{email}"/></label>
<label>Password <input name="password" type="password"/></label>
<label>Repeat password <input name="password1" type="password"/></label>
<button type="submit">Register</button>
</form>"#,
        csrf = ctx.csrf_input(),
        name = escape_html(name),
        email = escape_html(email),
    );
    render_page("Register", ctx, &body)
}

pub fn logon(ctx: &PageContext, email: &str) -> Html<String> {
    let body = format!(
        r#"<form method="post" action="/sessions/logon">
{csrf}
<label>Email <input name="email" type="email" value="{email}"/></label>
<label>Password <input name="password" type="password"/></label>
<button type="submit">Logon</button>
</form>"#,
        csrf = ctx.csrf_input(),
        email = escape_html(email),
    );
    render_page("Logon", ctx, &body)
}
