use serde::Deserialize;

use crate::contract::{JobPatch, NewJob};

/// Body of the new/edit job form. Unknown fields, such as a
/// client-supplied owner, are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobForm {
    pub company: String,
    pub position: String,
    pub status: String,
}

/// `{id}` route parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPath {
    pub id: String,
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

impl From<JobForm> for NewJob {
    fn from(f: JobForm) -> Self {
        Self {
            company: f.company,
            position: f.position,
            status: non_empty(f.status),
        }
    }
}

impl From<JobForm> for JobPatch {
    /// The form always carries company and position, so both are set.
    fn from(f: JobForm) -> Self {
        Self {
            company: Some(f.company),
            position: Some(f.position),
            status: non_empty(f.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_status_means_default() {
        let form = JobForm {
            company: "Acme".into(),
            position: "Engineer".into(),
            status: " ".into(),
        };
        assert_eq!(NewJob::from(form.clone()).status, None);
        assert_eq!(JobPatch::from(form).company.as_deref(), Some("Acme"));
    }
}
