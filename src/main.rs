//! Main entry point for the Arena Matchmaker service
//!
//! Production entry point that initializes and runs the matchmaking
//! service with logging, health endpoints, and graceful shutdown.

use anyhow::Result;
use arena_matchmaker::config::AppConfig;
use arena_matchmaker::service::{AppState, HealthCheck, HealthStatus};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Arena Matchmaker - queue and challenge pairing for wager games
#[derive(Parser)]
#[command(
    name = "arena-matchmaker",
    version,
    about = "A real-time matchmaking service for wager-based head-to-head games",
    long_about = "Arena Matchmaker pairs players of comparable skill at identical stakes, \
                 runs a mutual acceptance round before game creation, and supports direct \
                 player-to-player challenges. Events fan out over AMQP."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// AMQP URL override
    #[arg(long, value_name = "URL", help = "Override AMQP connection URL")]
    amqp_url: Option<String>,

    /// Health/metrics port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform a one-shot health check and exit with a status code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = Arc::new(AppState::new(config).await?);
    app_state.start().await?;

    match HealthCheck::check(app_state.clone()).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            println!("  Players Waiting: {}", health.stats.players_waiting);
            println!("  Pending Matches: {}", health.stats.pending_matches);
            println!("  Active Challenges: {}", health.stats.active_challenges);

            let _ = app_state.shutdown().await;
            if health.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Arena Matchmaker");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   AMQP: {}", config.amqp.url);
    info!(
        "   Tick interval: {}ms",
        config.matchmaking.tick_interval_ms
    );
    info!(
        "   Accept deadline: {}s",
        config.matchmaking.accept_deadline_seconds
    );
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(amqp_url) = &args.amqp_url {
        config.amqp.url = amqp_url.clone();
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let (health_server, health_task) = match app_state.spawn_health_server() {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start health server: {}", e);
            std::process::exit(1);
        }
    };

    info!("Arena Matchmaker is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    let shutdown_timeout = config.shutdown_timeout();
    let shutdown = async {
        if let Err(e) = health_server.stop().await {
            warn!("Failed to stop health server: {}", e);
        }
        let _ = health_task.await;
        if let Err(e) = app_state.shutdown().await {
            warn!("Shutdown reported an error: {}", e);
        }
    };

    match tokio::time::timeout(shutdown_timeout, shutdown).await {
        Ok(()) => info!("Graceful shutdown completed"),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Arena Matchmaker stopped");
    Ok(())
}
