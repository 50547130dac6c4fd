//! socktest - interactive TCP test client entry point
//!
//! # Usage
//!
//! ```bash
//! # Target the default 127.0.0.1:4242
//! socktest
//!
//! # Custom target
//! socktest --addr 10.0.0.5 --port 9000
//!
//! # Debug logging (written to the log file, never the console)
//! RUST_LOG=socktest_client=debug socktest
//! ```
//!
//! Logs go to `$XDG_STATE_HOME/socktest/client.log` (or the platform
//! equivalent) so they never interleave with console output.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::tty::IsTty;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use socktest_core::Endpoint;

use crate::console::{banner, clear_screen, menu, run_console};
use crate::session::ClientSession;

/// How long blocked stdin reads may hold up process exit.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(250);

/// socktest client - connect, get an identity, exchange lines
#[derive(Parser, Debug)]
#[command(name = "socktest", version, about)]
pub struct Args {
    /// Server address [env: SOCKTEST_ADDR] [default: 127.0.0.1]
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Server port, 1-65535 [env: SOCKTEST_PORT] [default: 4242]
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Parses arguments and runs the interactive client.
pub fn run() -> Result<()> {
    let args = Args::parse();

    if !std::io::stdout().is_tty() {
        bail!("Program must be run from a TTY");
    }

    let endpoint = Endpoint::from_env(args.addr, args.port).context("Invalid target address")?;

    init_logging();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(run_client(endpoint));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn run_client(endpoint: Endpoint) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), endpoint = %endpoint, "socktest starting");

    let mut session = ClientSession::new(endpoint);

    let mut stdout = tokio::io::stdout();
    let intro = format!(
        "{}{}\n{}\n",
        clear_screen(),
        banner(&session.status()),
        menu()
    );
    stdout.write_all(intro.as_bytes()).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    run_console(stdin, stdout, &mut session).await?;

    info!("socktest stopped");
    Ok(())
}

// ============================================================================
// Logging Setup
// ============================================================================

fn get_log_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("socktest"))
}

fn create_log_file() -> Option<fs::File> {
    let log_dir = get_log_dir()?;

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("client.log");

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

/// Logs to the state-dir file, or nowhere if it cannot be opened.
fn init_logging() {
    match create_log_file() {
        Some(file) => {
            let filter = EnvFilter::from_default_env().add_directive(
                "socktest_client=info"
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
            );

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
}
