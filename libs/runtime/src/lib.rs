//! Process-level plumbing shared by the server binary: layered configuration
//! and logging setup.

pub mod config;
pub mod logging;
pub mod paths;

pub use config::{
    AppConfig, CliArgs, DatabaseConfig, LoggingConfig, RateLimitConfig, SecurityConfig, Section,
    ServerConfig,
};
