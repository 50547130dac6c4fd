//! Operator console for the server.
//!
//! Reads commands line by line and reports on the registry:
//!
//! | Command | Effect                                        |
//! |---------|-----------------------------------------------|
//! | `/info` | Print the number of connected clients         |
//! | `/list` | Print identity, peer and age of each client   |
//! | `/exit` | Close all connections and stop the server     |
//!
//! Anything else just re-displays the prompt.

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::RegistryHandle;

/// Console prompt.
pub const PROMPT: &str = ">";

/// Commands understood by the server console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Info,
    List,
    Exit,
    /// Blank or unrecognised input.
    Other,
}

impl ServerCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "/info" => Self::Info,
            "/list" => Self::List,
            "/exit" => Self::Exit,
            _ => Self::Other,
        }
    }
}

/// Runs the console until `/exit`, end of input, or cancellation.
///
/// `/exit` and end of input both cancel `cancel_token`, which stops the
/// accept loop and closes every connection.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    prompt(&mut output).await?;

    loop {
        let line = tokio::select! {
            _ = cancel_token.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            debug!("Console input closed");
            cancel_token.cancel();
            return Ok(());
        };

        match ServerCommand::parse(&line) {
            ServerCommand::Info => {
                let count = registry.connected_count().await;
                output
                    .write_all(format!("Number of clients connected: {count}\n").as_bytes())
                    .await?;
            }
            ServerCommand::List => {
                output.write_all(render_list(&registry).await.as_bytes()).await?;
            }
            ServerCommand::Exit => {
                output.write_all(b"Shutting Down...\n").await?;
                output.flush().await?;
                cancel_token.cancel();
                return Ok(());
            }
            ServerCommand::Other => {}
        }

        prompt(&mut output).await?;
    }
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W) -> std::io::Result<()> {
    output.write_all(PROMPT.as_bytes()).await?;
    output.flush().await
}

async fn render_list(registry: &RegistryHandle) -> String {
    let connections = registry.list_connections().await;
    if connections.is_empty() {
        return "No clients connected.\n".to_string();
    }

    let now = Utc::now();
    connections
        .iter()
        .map(|info| {
            format!(
                "#{:<4} {:<22} connected {}s ago\n",
                info.id,
                info.peer,
                info.age_secs(now)
            )
        })
        .collect()
}
