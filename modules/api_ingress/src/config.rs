use serde::{Deserialize, Serialize};

/// HTTP host settings, derived from the `server` config section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiIngressConfig {
    pub bind_addr: String,
    /// Per-request timeout; 0 selects the default of 30 seconds.
    #[serde(default)]
    pub timeout_sec: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            timeout_sec: 0,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}
