use anyhow::{anyhow, bail, Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use api_ingress::{shutdown::wait_for_shutdown, ApiIngress, ApiIngressConfig};
use httpkit::{
    body::BodyLimit,
    rate_limit::RateLimitPolicy,
    session::{SessionLayerState, SessionStore},
    Pipeline,
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often expired sessions and rate-limit windows are dropped.
const JANITOR_PERIOD: Duration = Duration::from_secs(60);

const MOCK_DSN: &str = "sqlite::memory:";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Adds `mode=rwc` unless a mode is given, so a missing file is created.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok(MOCK_DSN.to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if let Some(dir) = p.parent() {
        if create_dirs {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }

    let mut params: Vec<&str> = query
        .map(|q| q.split('&').filter(|kv| !kv.is_empty()).collect())
        .unwrap_or_default();
    if !params.iter().any(|kv| kv.starts_with("mode=")) {
        params.push("mode=rwc");
    }

    // Rebuild DSN with absolute path and normalized slashes
    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    out.push('?');
    out.push_str(&params.join("&"));
    Ok(out)
}

/// Only SQLite is supported.
fn detect_from_dsn(cfg: &DatabaseConfig) -> Result<()> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        bail!("Database URL not configured");
    }

    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;
    match url.scheme() {
        "sqlite" => Ok(()),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

/// Jobtrack Server - keep track of the jobs you applied for
#[derive(Parser)]
#[command(name = "jobtrack-server")]
#[command(about = "Jobtrack Server - keep track of the jobs you applied for")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory database and an ephemeral session secret
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI args passed down to config/app
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    // Apply CLI overrides (port / verbosity)
    config.apply_cli_overrides(&args);
    config.validate()?;

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Initialize logging
    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("Jobtrack Server starting");

    // Execute command
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(&config, &args),
        Commands::Migrate => migrate(&config, &args).await,
    }
}

/// The configured secret, or a throwaway one under `--mock`.
fn session_secret(config: &AppConfig, mock: bool) -> Result<String> {
    let secret = &config.security.session_secret;
    if !secret.is_empty() {
        return Ok(secret.clone());
    }
    if mock {
        tracing::warn!("No session secret configured, using an ephemeral one (--mock)");
        return Ok(nanoid::nanoid!(64));
    }
    bail!("security.session_secret is not configured (set it in the config file or via APP__SECURITY__SESSION_SECRET)")
}

async fn connect_db(config: &AppConfig, mock: bool) -> Result<DatabaseConnection> {
    let mut opts = if mock {
        // every pooled connection would get its own in-memory database
        let mut opts = ConnectOptions::new(MOCK_DSN);
        opts.max_connections(1);
        opts
    } else {
        let db_config = config
            .database
            .as_ref()
            .ok_or_else(|| anyhow!("Database URL not configured"))?;
        detect_from_dsn(db_config)?;

        // Absolutize sqlite DSNs to avoid cwd issues
        let base_dir = PathBuf::from(&config.server.home_dir);
        let dsn = absolutize_sqlite_dsn(db_config.url.trim(), &base_dir, true)?;

        let busy = Duration::from_millis(u64::from(db_config.busy_timeout_ms.unwrap_or(5000)));
        let mut opts = ConnectOptions::new(dsn);
        opts.max_connections(db_config.max_conns.unwrap_or(10))
            .map_sqlx_sqlite_opts(move |o| o.busy_timeout(busy));
        opts
    };
    opts.acquire_timeout(Duration::from_secs(5)).sqlx_logging(false);

    tracing::info!("Connecting to database: {}", opts.get_url());
    let db = Database::connect(opts)
        .await
        .context("Failed to connect to database")?;
    Ok(db)
}

async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    accounts::infra::storage::migrations::Migrator::up(db, None)
        .await
        .context("accounts migrations failed")?;
    jobs::infra::storage::migrations::Migrator::up(db, None)
        .await
        .context("jobs migrations failed")?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Application routes: accounts at `/` and `/sessions/*`, jobs at `/jobs/*`.
fn app_routes(db: &DatabaseConnection, config: &AppConfig) -> Router {
    let users = Arc::new(accounts::infra::storage::SeaOrmUsersRepository::new(db.clone()));
    let accounts_svc = Arc::new(accounts::domain::service::Service::new(
        users,
        accounts::domain::service::ServiceConfig {
            bcrypt_cost: config.security.bcrypt_cost,
            ..Default::default()
        },
    ));

    let jobs_repo = Arc::new(jobs::infra::storage::SeaOrmJobsRepository::new(db.clone()));
    let jobs_svc = Arc::new(jobs::domain::service::Service::new(
        jobs_repo,
        jobs::domain::service::ServiceConfig::default(),
    ));

    let router = accounts::api::web::routes::register_routes(Router::new(), accounts_svc);
    jobs::api::web::routes::register_routes(router, jobs_svc)
}

fn build_pipeline(config: &AppConfig, secret: &str) -> Result<Pipeline> {
    let security = &config.security;
    let store = SessionStore::new(Duration::from_secs(security.session_ttl_secs));
    let sessions = SessionLayerState::new(store, secret, security.secure_cookies)?;

    let rl = &security.rate_limit;
    let policy = RateLimitPolicy {
        window: Duration::from_secs(rl.window_secs),
        max_requests: rl.max_requests,
        trust_proxy: rl.trust_proxy,
    };
    Ok(Pipeline::new(
        policy,
        sessions,
        BodyLimit(config.server.max_body_bytes),
    ))
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    tracing::info!("Initializing modules...");

    let secret = session_secret(&config, args.mock)?;
    let db = connect_db(&config, args.mock).await?;
    run_migrations(&db).await?;

    let pipeline = build_pipeline(&config, &secret)?;
    let ingress = ApiIngress::new(ApiIngressConfig {
        bind_addr: config.bind_addr(),
        timeout_sec: config.server.timeout_sec,
        max_body_bytes: config.server.max_body_bytes,
    });
    let router = ingress.build_router(app_routes(&db, &config), &pipeline);

    let cancel = CancellationToken::new();
    let janitor = pipeline.spawn_janitor(JANITOR_PERIOD, cancel.clone());

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown().await {
            tracing::error!(error = %e, "Signal handler failed");
        }
        on_signal.cancel();
    });

    let served = ingress.serve(router, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = janitor.await {
        tracing::warn!(error = %e, "Janitor task failed");
    }
    if let Err(e) = db.close().await {
        tracing::warn!(error = %e, "Failed to close database");
    }
    tracing::info!("Jobtrack Server stopped");
    served
}

fn check_config(config: &AppConfig, args: &CliArgs) -> Result<()> {
    tracing::info!("Checking configuration...");

    session_secret(config, args.mock)?;
    if !args.mock {
        let db_config = config
            .database
            .as_ref()
            .ok_or_else(|| anyhow!("Database URL not configured"))?;
        detect_from_dsn(db_config)?;
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Server config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}

async fn migrate(config: &AppConfig, args: &CliArgs) -> Result<()> {
    let db = connect_db(config, args.mock).await?;
    run_migrations(&db).await?;
    db.close().await.context("Failed to close database")?;
    println!("Migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sqlite_path_is_resolved_against_home() {
        let home = tempfile::tempdir().unwrap();
        let dsn = absolutize_sqlite_dsn("sqlite://database/jobtrack.db", home.path(), true).unwrap();

        let expected = home.path().join("database/jobtrack.db");
        assert_eq!(
            dsn,
            format!(
                "sqlite://{}?mode=rwc",
                expected.to_string_lossy().replace('\\', "/")
            )
        );
        assert!(home.path().join("database").is_dir());
    }

    #[test]
    fn existing_mode_is_kept() {
        let home = tempfile::tempdir().unwrap();
        let dsn =
            absolutize_sqlite_dsn("sqlite://db.sqlite?mode=ro&cache=shared", home.path(), false)
                .unwrap();
        assert!(dsn.ends_with("?mode=ro&cache=shared"));
    }

    #[test]
    fn memory_dsn_is_untouched() {
        let dsn = absolutize_sqlite_dsn("sqlite://:memory:", Path::new("/x"), false).unwrap();
        assert_eq!(dsn, MOCK_DSN);
    }

    #[test]
    fn only_sqlite_is_accepted() {
        let cfg = |url: &str| DatabaseConfig {
            url: url.into(),
            max_conns: None,
            busy_timeout_ms: None,
        };
        assert!(detect_from_dsn(&cfg("sqlite://database/jobtrack.db")).is_ok());
        assert!(detect_from_dsn(&cfg("postgresql://localhost/db")).is_err());
        assert!(detect_from_dsn(&cfg("  ")).is_err());
    }

    #[test]
    fn secret_is_required_outside_mock() {
        let config = AppConfig::default();
        assert!(session_secret(&config, false).is_err());
        assert_eq!(session_secret(&config, true).unwrap().len(), 64);
    }
}
