use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vulnscan_core::{
    application::AppUnitOfWork,
    database::postgres,
    domain::{
        scans::HttpScanEngine, users::auth::AuthCrypto,
        verification::VerificationService,
    },
};
use vulnscan_server::{
    AppState, create_app,
    infra::config::{Config, ConfigLoad, ConfigLoader, ConfigWarnings},
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "vulnscan-server")]
#[command(about = "Web vulnerability scanner backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dotenv file to load instead of `./.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
    /// Delete used and expired verification tokens
    PurgeTokens,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.serve)?;

    match cli.command {
        Some(Command::Db(DbCommand::Migrate)) => run_db_migrate(&config).await,
        Some(Command::Db(DbCommand::PurgeTokens)) => {
            run_db_purge_tokens(&config).await
        }
        None => run_server(config).await,
    }
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                |_| "info,tower_http=warn,sqlx=warn".into(),
            ),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded environment file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    log_warnings(&warnings);

    Ok(Arc::new(config))
}

fn log_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
}

async fn connect_database(config: &Config) -> anyhow::Result<sqlx::PgPool> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set (or database.url in the config file)")?;
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        anyhow::bail!(
            "Invalid database URL: must start with postgres:// or postgresql://"
        );
    }

    postgres::connect(url, &config.pool_settings())
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;
    postgres::migrate(&pool)
        .await
        .context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_db_purge_tokens(config: &Config) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;
    let unit_of_work = AppUnitOfWork::postgres(pool);
    let verification =
        VerificationService::new(unit_of_work.verification_tokens, build_crypto(config)?);

    let purged = verification
        .purge_stale(chrono::Utc::now())
        .await
        .context("failed to purge verification tokens")?;
    info!(purged, "stale verification tokens removed");
    Ok(())
}

fn build_crypto(config: &Config) -> anyhow::Result<Arc<AuthCrypto>> {
    let token_key = config
        .auth
        .verification_token_key()
        .context("failed to derive verification token key")?;
    let crypto = AuthCrypto::new(config.auth.password_pepper.as_bytes(), token_key)
        .context("failed to initialize authentication crypto helpers")?;
    Ok(Arc::new(crypto))
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let pool = connect_database(&config).await?;
    postgres::migrate(&pool)
        .await
        .context("database migration failed")?;
    info!("Database schema up to date");

    let crypto = build_crypto(&config)?;
    let engine = Arc::new(
        HttpScanEngine::new(config.engine_settings())
            .context("failed to build scanning engine client")?,
    );
    info!(
        engine.base_url = %config.engine.base_url,
        engine.timeout_secs = config.engine.timeout.as_secs(),
        scan.max_concurrent_scans = config.scan.max_concurrent_scans,
        "scanning engine configuration in effect"
    );

    let state = AppState::new(
        Arc::clone(&config),
        Arc::new(AppUnitOfWork::postgres(pool)),
        crypto,
        engine,
    )
    .context("failed to initialize session manager")?;

    let bind = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(bind).await.with_context(|| {
        format!("failed to bind {}:{}", config.server.host, config.server.port)
    })?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("Starting vulnscan server (HTTP) on {addr}");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
