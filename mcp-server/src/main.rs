mod config;
mod http;
mod self_update;
mod setup;
mod stdio;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Transport};
use setup::{ensure_database_directory_from_config, initialize_app};
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "work-item-mcp")]
#[command(about = "MCP server for hierarchical work-item management")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Start the server (required; without it, usage is printed)
    #[arg(long)]
    start: bool,

    /// Transport to serve on
    #[arg(long, env = "TRANSPORT")]
    transport: Option<String>,

    /// HTTP bind host, used only when transport is http
    #[arg(long, env = "HTTP_HOST")]
    http_host: Option<String>,

    /// HTTP bind port, used only when transport is http
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,

    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Store file path override
    #[arg(long, env = "DATABASE_PATH")]
    database_path: Option<String>,

    /// Directory holding `.workflow/config.yaml` and `.workflow/schemas.yaml`
    #[arg(long, env = "CONFIG_DIR")]
    config_dir: Option<String>,

    /// Log level override
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Check for updates and install if available
    #[arg(long = "self-update")]
    self_update: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => {
            info!("Loading configuration from file: {}", config_file);
            Config::from_file(config_file)?
        }
        None => {
            info!("Loading configuration from environment");
            Config::from_env()?
        }
    };

    if let Some(ref database_path) = cli.database_path {
        info!("Overriding database path from CLI");
        config.database.path = database_path.clone();
    }

    if let Some(ref transport) = cli.transport {
        match transport.to_lowercase().as_str() {
            "stdio" => config.server.transport = Transport::Stdio,
            "http" => config.server.transport = Transport::Http,
            other => return Err(anyhow::anyhow!("Unknown transport: {other}")),
        }
    }

    if let Some(ref http_host) = cli.http_host {
        config.server.http_host = http_host.clone();
    }

    if let Some(http_port) = cli.http_port {
        config.server.http_port = http_port;
    }

    if let Some(ref config_dir) = cli.config_dir {
        config.server.config_dir = Some(config_dir.clone());
    }

    if let Some(ref log_level) = cli.log_level {
        info!("Overriding log level from CLI");
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if cli.self_update {
        return self_update::self_update(env!("CARGO_PKG_VERSION")).await;
    }

    if !cli.start {
        println!("work-item-mcp - Hierarchical work-item management over MCP");
        println!();
        println!("Usage:");
        println!("  work-item-mcp --start [--transport=stdio|http] [--http-port=3001]");
        println!();
        println!("Environment variables: DATABASE_PATH, CONFIG_DIR, TRANSPORT, HTTP_HOST,");
        println!("HTTP_PORT, LOG_LEVEL. See --help for CLI overrides.");
        return Ok(());
    }

    let config = match load_config(&cli).context("Failed to load configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_telemetry(&config.logging).context("Failed to initialize telemetry")?;
    log_config_validation(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
        std::process::exit(1);
    }

    log_startup_info(&config);

    if let Err(e) = ensure_database_directory_from_config(&config) {
        error!(error = %e, "Failed to create database directory");
        std::process::exit(1);
    }

    let server = match initialize_app(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to initialize application");
            std::process::exit(1);
        }
    };

    info!(transport = ?config.server.transport, "work-item-mcp ready");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler");
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                    .expect("Failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
            }
        }

        #[cfg(windows)]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        let _ = shutdown_tx.send(());
    });

    let serve_result = tokio::select! {
        result = run_transport(&config, server) => result,
        _ = shutdown_rx => {
            info!("Shutdown signal received, stopping server");
            Ok(())
        }
    };

    match serve_result {
        Ok(()) => {
            info!("work-item-mcp shut down cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Transport failed to start or exited with an error");
            std::process::exit(2);
        }
    }
}

async fn run_transport(config: &Config, server: mcp_protocol::WorkItemServer) -> Result<()> {
    match config.server.transport {
        Transport::Stdio => stdio::serve(server).await,
        Transport::Http => http::serve(server, &config.http_address()).await,
    }
}
