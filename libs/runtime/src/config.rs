use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths::home_dir::resolve_home_dir;

/// Minimum length of `security.session_secret`, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Main application configuration. Loaded once at startup and handed to
/// component constructors; nothing reads it from global state.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Core server configuration.
    pub server: ServerConfig,
    /// Database configuration (optional).
    pub database: Option<DatabaseConfig>,
    /// Sessions, cookies, password hashing and rate limiting.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub home_dir: String, // normalized to an absolute path on load
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub timeout_sec: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database connection URL, e.g. "sqlite://database/jobtrack.db".
    pub url: String,
    /// Maximum number of connections in the pool (defaults to 10).
    pub max_conns: Option<u32>,
    /// SQLite busy timeout in milliseconds (defaults to 5000).
    pub busy_timeout_ms: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// Secret the session cookie signing key is derived from.
    pub session_secret: String,
    /// Mark cookies `Secure` (set behind TLS).
    pub secure_cookies: bool,
    /// Idle lifetime of a session.
    pub session_ttl_secs: u64,
    pub bcrypt_cost: u32,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    /// Take the client address from `x-forwarded-for`.
    pub trust_proxy: bool,
}

/// Logging configuration: subsystem name -> settings.
/// Key "default" is the catch-all for targets not matched by another key.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    pub file: String,          // "logs/jobtrack.log", empty disables the file
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // Empty => $HOME/.jobtrack
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            timeout_sec: 0,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            secure_cookies: false,
            session_ttl_secs: 24 * 60 * 60,
            bcrypt_cost: 12,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
            trust_proxy: false,
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/jobtrack.log".to_string(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: Some(DatabaseConfig {
                url: "sqlite://database/jobtrack.db".to_string(),
                max_conns: Some(10),
                busy_timeout_ms: Some(5000),
            }),
            security: SecurityConfig::default(),
            logging: Some(default_logging_config()),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults -> YAML file -> `APP__*` environment variables.
    /// Normalizes `server.home_dir` into an absolute path and creates it.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let config_path = config_path.as_ref();
        if !config_path.is_file() {
            bail!("config file not found: {}", config_path.display());
        }

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            server: ServerConfig::default(),
            database: None,
            security: SecurityConfig::default(),
            logging: None,
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path))
            // APP__SECURITY__SESSION_SECRET=... maps to security.session_secret
            .merge(Env::prefixed("APP__").split("__"));

        let mut config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to parse config {}", config_path.display()))?;

        normalize_home_dir_inplace(&mut config.server)
            .context("Failed to resolve server.home_dir")?;

        Ok(config)
    }

    /// Load configuration from file, or defaults when no file is given.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.server)
                    .context("Failed to resolve server.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    /// Reject values that would only fail later, at first request.
    pub fn validate(&self) -> Result<()> {
        let secret_len = self.security.session_secret.len();
        if secret_len > 0 && secret_len < MIN_SESSION_SECRET_LEN {
            bail!(
                "security.session_secret must be at least {MIN_SESSION_SECRET_LEN} bytes (got {secret_len})"
            );
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            bail!(
                "security.bcrypt_cost must be within 4..=31 (got {})",
                self.security.bcrypt_cost
            );
        }
        let rl = &self.security.rate_limit;
        if rl.max_requests == 0 || rl.window_secs == 0 {
            bail!("security.rate_limit.window_secs and max_requests must be positive");
        }
        if self.security.session_ttl_secs == 0 {
            bail!("security.session_ttl_secs must be positive");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Serialize configuration to YAML, with the session secret redacted.
    pub fn to_yaml(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.security.session_secret.is_empty() {
            shown.security.session_secret = "<redacted>".to_string();
        }
        serde_yaml::to_string(&shown).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
    pub mock: bool,
}

const fn default_subdir() -> &'static str {
    ".jobtrack"
}

fn normalize_home_dir_inplace(server: &mut ServerConfig) -> Result<()> {
    let configured = if server.home_dir.trim().is_empty() {
        None
    } else {
        Some(server.home_dir.clone())
    };

    let resolved: PathBuf = resolve_home_dir(configured, default_subdir(), true)
        .context("home_dir normalization failed")?;

    server.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn is_normalized_path(p: &str) -> bool {
        PathBuf::from(p).is_absolute() && !p.starts_with('~')
    }

    fn write_config(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("cfg.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_default_config_structure() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.home_dir, "");
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);

        let db = config.database.as_ref().unwrap();
        assert_eq!(db.url, "sqlite://database/jobtrack.db");
        assert_eq!(db.max_conns, Some(10));

        assert_eq!(config.security.rate_limit.window_secs, 900);
        assert_eq!(config.security.rate_limit.max_requests, 100);
        assert_eq!(config.security.bcrypt_cost, 12);
        assert!(config.security.session_secret.is_empty());

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].file, "logs/jobtrack.log");
    }

    #[test]
    fn test_load_layered_reads_all_sections() {
        let tmp = tempdir().unwrap();
        let home = tmp.path().join("home");
        let yaml = format!(
            r#"
server:
  home_dir: "{}"
  host: "0.0.0.0"
  port: 9090
  timeout_sec: 30

database:
  url: "sqlite://data/jobs.db"
  max_conns: 4

security:
  session_secret: "0123456789abcdef0123456789abcdef"
  secure_cookies: true
  rate_limit:
    window_secs: 60
    max_requests: 5

logging:
  default:
    console_level: debug
    file: "logs/default.log"
"#,
            home.to_string_lossy().replace('\\', "/")
        );
        let path = write_config(tmp.path(), &yaml);

        let config = AppConfig::load_layered(&path).unwrap();

        assert!(is_normalized_path(&config.server.home_dir));
        assert!(home.is_dir(), "home_dir is created on load");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.timeout_sec, 30);
        assert_eq!(config.database.as_ref().unwrap().max_conns, Some(4));
        assert!(config.security.secure_cookies);
        assert_eq!(config.security.rate_limit.window_secs, 60);
        assert_eq!(config.security.rate_limit.max_requests, 5);
        // untouched keys keep their defaults
        assert_eq!(config.security.bcrypt_cost, 12);
        assert!(!config.security.rate_limit.trust_proxy);
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_minimal_yaml_config() {
        let tmp = tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
server:
  home_dir: "~/.jobtrack_minimal"
  host: "localhost"
  port: 8080
"#,
        );

        let config = AppConfig::load_layered(&path).unwrap();

        assert!(config.server.home_dir.ends_with(".jobtrack_minimal"));
        assert_eq!(config.server.port, 8080);
        assert!(config.database.is_none());
        assert!(config.logging.is_none());
        assert_eq!(config.security.session_ttl_secs, 86400);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load_layered("/nonexistent/jobtrack.yaml").unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let tmp = tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"
server:
  home_dir: "~/.jobtrack_unknown"
  host: "localhost"
  port: 8080
  colour: blue
"#,
        );
        assert!(AppConfig::load_layered(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = AppConfig::default();
        config.security.session_secret = "short".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session_secret"));

        config.security.session_secret = "x".repeat(MIN_SESSION_SECRET_LEN);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_rate_limit() {
        let mut config = AppConfig::default();
        config.security.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            port: Some(4000),
            verbose: 2,
            ..Default::default()
        };

        config.apply_cli_overrides(&args);

        assert_eq!(config.server.port, 4000);
        assert_eq!(
            config.logging.as_ref().unwrap()["default"].console_level,
            "trace"
        );
    }

    #[test]
    fn test_cli_verbose_levels_matrix() {
        for (verbose, expected) in [(0, "info"), (1, "debug"), (2, "trace"), (3, "trace")] {
            let mut config = AppConfig::default();
            let args = CliArgs {
                verbose,
                ..Default::default()
            };
            config.apply_cli_overrides(&args);
            assert_eq!(
                config.logging.as_ref().unwrap()["default"].console_level,
                expected
            );
        }
    }

    #[test]
    fn test_to_yaml_redacts_secret() {
        let mut config = AppConfig::default();
        config.security.session_secret = "s".repeat(40);
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("server:"));
        assert!(yaml.contains("<redacted>"));
        assert!(!yaml.contains(&"s".repeat(40)));

        let roundtrip: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(roundtrip.server.port, config.server.port);
    }
}
