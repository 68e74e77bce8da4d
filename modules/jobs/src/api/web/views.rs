use axum::response::Html;
use httpkit::{escape_html, render_page, PageContext};

use crate::contract::{Job, JobStatus};

/// Values shown in the job form.
#[derive(Debug, Default)]
pub struct FormValues<'a> {
    pub company: &'a str,
    pub position: &'a str,
    pub status: &'a str,
}

impl<'a> From<&'a Job> for FormValues<'a> {
    fn from(job: &'a Job) -> Self {
        Self {
            company: &job.company,
            position: &job.position,
            status: job.status.as_str(),
        }
    }
}

pub fn list(ctx: &PageContext, jobs: &[Job]) -> Html<String> {
    let mut body = String::from(r#"<p><a href="/jobs/new">Add a job</a></p>"#);
    if jobs.is_empty() {
        body.push_str("<p>You have not added any jobs yet.</p>");
        return render_page("Jobs", ctx, &body);
    }

    body.push_str(
        "<table>\n<tr><th>Company</th><th>Position</th><th>Status</th><th>Added</th><th></th></tr>\n",
    );
    for job in jobs {
        body.push_str(&format!(
            r#"<tr><td>{company}</td><td>{position}</td><td>{status}</td><td>{added}</td>
<td><a href="/jobs/edit/{id}">Edit</a>
<form method="post" action="/jobs/delete/{id}" class="inline">{csrf}<button type="submit">Delete</button></form></td></tr>
"#,
            company = escape_html(&job.company),
            position = escape_html(&job.position),
            status = job.status.as_str(),
            added = job.created_at.format("%Y-%m-%d"),
            id = job.id,
            csrf = ctx.csrf_input(),
        ));
    }
    body.push_str("</table>");
    render_page("Jobs", ctx, &body)
}

/// `action` is `/jobs/new` or `/jobs/edit/{id}`.
pub fn form(ctx: &PageContext, title: &str, action: &str, values: &FormValues<'_>) -> Html<String> {
    let options: String = JobStatus::ALL
        .iter()
        .map(|st| {
            let selected = if st.as_str() == values.status {
                r#" selected="selected""#
            } else {
                ""
            };
            format!(r#"<option value="{0}"{selected}>{0}</option>"#, st.as_str())
        })
        .collect();

    let body = format!(
        r#"<form method="post" action="{action}">
{csrf}
<label>Company <input name="company" value="{company}" maxlength="50"/></label>
<label>Position <input name="position" value="{position}" maxlength="100"/></label>
<label>Status <select name="status">{options}</select></label>
<button type="submit">Save</button>
</form>
<p><a href="/jobs">Back to jobs</a></p>"#,
        action = escape_html(action),
        csrf = ctx.csrf_input(),
        company = escape_html(values.company),
        position = escape_html(values.position),
    );
    render_page(title, ctx, &body)
}
