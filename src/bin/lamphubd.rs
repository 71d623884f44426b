//! lamphub daemon - smart-light state hub
//!
//! Accepts device connections, serves the operator HTTP API and pushes
//! state to operator and display observers.
//!
//! # Usage
//!
//! ```bash
//! # Start the hub with defaults (ports 8765, 8080, 8766)
//! lamphubd
//!
//! # Start with a config file and a port override
//! lamphubd --config /etc/lamphub.toml --http-port 9080 start
//!
//! # Print the effective configuration and exit
//! lamphubd config
//!
//! # Enable debug logging
//! RUST_LOG=lamphubd=debug lamphubd start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lamphub_protocol::ParseFailurePolicy;
use lamphubd::{Hub, HubConfig, HubServer};

/// lamphub daemon - smart-light state hub
#[derive(Parser, Debug)]
#[command(name = "lamphubd", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "LAMPHUB_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Address every listener binds to
    #[arg(long, global = true)]
    host: Option<String>,

    /// Device WebSocket port
    #[arg(long, global = true)]
    device_port: Option<u16>,

    /// Operator HTTP + WebSocket port
    #[arg(long, global = true)]
    http_port: Option<u16>,

    /// Display WebSocket port
    #[arg(long, global = true)]
    display_port: Option<u16>,

    /// What to do with commands that do not parse (use_default or reject)
    #[arg(long, global = true)]
    on_parse_failure: Option<ParseFailurePolicy>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the hub (default)
    Start,
    /// Print the effective configuration as TOML
    Config,
}

impl Args {
    /// Loads file and environment layers, then applies flags on top.
    fn resolve_config(&self) -> Result<HubConfig> {
        let mut config =
            HubConfig::load(self.config.as_deref()).context("Failed to load configuration")?;

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.device_port {
            config.device_port = port;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(port) = self.display_port {
            config.display_port = port;
        }
        if let Some(policy) = self.on_parse_failure {
            config.on_parse_failure = policy;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    match args.command.unwrap_or(Command::Start) {
        Command::Start => run_hub(config),
        Command::Config => {
            let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{text}");
            Ok(())
        }
    }
}

/// Runs the hub (async entry point).
#[tokio::main]
async fn run_hub(config: HubConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lamphubd=info".parse()?)
                .add_directive("lamphub_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "lamphub daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let hub = Hub::new(config, cancel_token);
    let server = HubServer::new(hub);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("lamphub daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
