//! socktestd - TCP relay server entry point
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default 127.0.0.1:4242
//! socktestd
//!
//! # Custom address/port
//! socktestd --addr 0.0.0.0 --port 9000
//!
//! # Same, through the environment
//! SOCKTEST_ADDR=0.0.0.0 SOCKTEST_PORT=9000 socktestd
//!
//! # Enable debug logging
//! RUST_LOG=socktestd=debug socktestd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: close all connections and exit (same as `/exit`)

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use socktest_core::Endpoint;

use crate::console::run_console;
use crate::registry::spawn_registry;
use crate::server::RelayServer;

/// How long blocked stdin reads may hold up process exit.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(250);

/// socktest server - accepts clients, assigns identities, echoes text
#[derive(Parser, Debug)]
#[command(name = "socktestd", version, about)]
pub struct Args {
    /// Address to bind [env: SOCKTEST_ADDR] [default: 127.0.0.1]
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Port to bind, 1-65535 [env: SOCKTEST_PORT] [default: 4242]
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Parses arguments and runs the server to completion.
pub fn run() -> Result<()> {
    let args = Args::parse();
    let endpoint = Endpoint::from_env(args.addr, args.port).context("Invalid listen address")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(run_server(endpoint));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Runs the server (async entry point).
async fn run_server(endpoint: Endpoint) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("socktestd=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    println!("======================\n  Socket Test Server\n======================");

    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %endpoint,
        "socktestd starting"
    );

    let cancel_token = CancellationToken::new();
    let registry = spawn_registry();

    // Bind failure is the one fatal condition
    let server = RelayServer::bind(
        endpoint.addr(),
        endpoint.port(),
        registry.clone(),
        cancel_token.clone(),
    )
    .await
    .context("Failed to start server")?;

    let addr = server.local_addr()?;
    println!("Listening on: {} Port: {}", addr.ip(), addr.port());

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // Operator console
    let console_token = cancel_token.clone();
    let console_registry = registry.clone();
    tokio::spawn(async move {
        let input = BufReader::new(tokio::io::stdin());
        let output = tokio::io::stdout();
        if let Err(e) = run_console(input, output, console_registry, console_token).await {
            error!(error = %e, "Console error");
        }
    });

    server.run().await?;

    info!("socktestd stopped");
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
