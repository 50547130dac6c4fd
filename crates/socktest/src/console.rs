//! Operator console for the client: command parsing and notice rendering.
//!
//! Commands are matched case-insensitively on their first word; any line
//! that is not a command is sent to the server unchanged.
//!
//! | Command                          | Effect                                |
//! |----------------------------------|---------------------------------------|
//! | `/connect`, `/conn`, `/c`        | Connect to the configured target      |
//! | `/disconnect`, `/disc`, `/d`     | Disconnect                            |
//! | `/set addr <host>`               | Change target host                    |
//! | `/set port <1-65535>`            | Change target port                    |
//! | `/info`                          | Show target and assigned identity     |
//! | `/help`                          | Show the command menu                 |
//! | `/clear`                         | Clear the screen                      |
//! | `/quit`, `/exit`                 | Disconnect and terminate              |

use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use socktest_core::Notice;

use crate::error::Result;
use crate::session::{ClientSession, SessionStatus};

/// Console prompt.
pub const PROMPT: &str = ">";

/// How long `/quit` waits for the server to acknowledge the disconnect.
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Connect,
    Disconnect,
    SetAddr(String),
    SetPort(String),
    /// `/set` with a missing or unknown argument.
    SetUsage,
    Info,
    Help,
    Clear,
    Quit,
    /// Blank line.
    Empty,
    /// Anything else, sent as typed.
    Send(String),
}

impl ClientCommand {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Self::Empty;
        };

        match command.to_lowercase().as_str() {
            "/connect" | "/conn" | "/c" => Self::Connect,
            "/disconnect" | "/disc" | "/d" => Self::Disconnect,
            "/quit" | "/exit" => Self::Quit,
            "/help" => Self::Help,
            "/info" => Self::Info,
            "/clear" => Self::Clear,
            "/set" => {
                let field = words.next().map(str::to_lowercase);
                match (field.as_deref(), words.next()) {
                    (Some("addr"), Some(value)) => Self::SetAddr(value.to_string()),
                    (Some("port"), Some(value)) => Self::SetPort(value.to_string()),
                    _ => Self::SetUsage,
                }
            }
            _ => Self::Send(line.to_string()),
        }
    }
}

/// Whether the console keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Runs the console until `/quit`, `/exit` or end of input.
///
/// Operator lines and transport notices are interleaved on `output` as
/// they happen. On the way out the session is disconnected and given a
/// short grace period to see the stream close.
pub async fn run_console<R, W>(input: R, mut output: W, session: &mut ClientSession) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    prompt(&mut output).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Console input closed");
                    break;
                };
                if handle_line(session, &line, &mut output).await? == Flow::Quit {
                    break;
                }
                prompt(&mut output).await?;
            }

            notices = session.next_notices() => {
                if notices.is_empty() {
                    continue;
                }
                for notice in &notices {
                    write_line(&mut output, &render_notice(notice)).await?;
                }
                prompt(&mut output).await?;
            }
        }
    }

    write_line(&mut output, "Shutting Down...").await?;

    if session.state().has_connection() {
        session.disconnect();
        let closed = tokio::time::timeout(QUIT_GRACE, async {
            while session.state().has_connection() {
                session.next_notices().await;
            }
        })
        .await;
        if closed.is_err() {
            warn!("Stream still open at exit");
        }
    }
    session.shutdown();

    Ok(())
}

async fn handle_line<W>(session: &mut ClientSession, line: &str, output: &mut W) -> Result<Flow>
where
    W: AsyncWrite + Unpin,
{
    let notices = match ClientCommand::parse(line) {
        ClientCommand::Connect => session.connect(),
        ClientCommand::Disconnect => session.disconnect(),
        ClientCommand::Send(line) => session.send_line(line),
        ClientCommand::SetAddr(addr) => {
            let text = match session.set_addr(&addr) {
                Ok(()) => format!("Set addr to {}", addr.as_str().green()),
                Err(e) => e.to_string(),
            };
            write_line(output, &text).await?;
            Vec::new()
        }
        ClientCommand::SetPort(port) => {
            let text = match session.set_port(&port) {
                Ok(()) => format!("Set port to {port}"),
                Err(_) => "Invalid port number. Please enter a number between 1 and 65535".to_string(),
            };
            write_line(output, &text).await?;
            Vec::new()
        }
        ClientCommand::SetUsage => {
            write_line(output, &set_usage()).await?;
            Vec::new()
        }
        ClientCommand::Info => {
            write_line(output, &render_status(&session.status())).await?;
            Vec::new()
        }
        ClientCommand::Help => {
            write_line(output, &menu()).await?;
            Vec::new()
        }
        ClientCommand::Clear => {
            output.write_all(clear_screen().as_bytes()).await?;
            Vec::new()
        }
        ClientCommand::Quit => return Ok(Flow::Quit),
        ClientCommand::Empty => Vec::new(),
    };

    for notice in &notices {
        write_line(output, &render_notice(notice)).await?;
    }
    Ok(Flow::Continue)
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W) -> std::io::Result<()> {
    output.write_all(PROMPT.as_bytes()).await?;
    output.flush().await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

/// ANSI sequence that clears the screen and homes the cursor.
pub fn clear_screen() -> String {
    let mut sequence = String::new();
    // Writing into a String cannot fail
    let _ = Clear(ClearType::All).write_ansi(&mut sequence);
    let _ = MoveTo(0, 0).write_ansi(&mut sequence);
    sequence
}

/// Startup banner with the initial target.
pub fn banner(status: &SessionStatus) -> String {
    format!(
        "======================\n  Socket Test Client\n======================\nAddress: {} Port: {}",
        status.addr.as_str().green(),
        status.port
    )
}

/// Command menu shown at startup and on `/help`.
pub fn menu() -> String {
    format!(
        "Available Commands:\n\
         /conn - Attempts to connect to currently configured host and port.\n\
         /disc - Disconnects from server.\n\
         /exit - Terminates application.\n\
         /set  - Sets connection info. Must specify {} or {}\n\
         /help - Outputs this menu.\n\
         /info - Outputs current connection info.\n\
         /quit - Terminates application.",
        "addr".magenta(),
        "port".magenta()
    )
}

/// `/info` output: target and identity.
pub fn render_status(status: &SessionStatus) -> String {
    let identity = match status.identity {
        Some(id) => id.to_string(),
        None => "Not connected".red().to_string(),
    };
    format!("{} {} ID#: {}", status.addr.as_str().green(), status.port, identity)
}

/// Hint for a malformed `/set`.
pub fn set_usage() -> String {
    format!(
        "Invalid parameters. Usage: {} or {}",
        "/set port <port>".bold(),
        "/set addr <ip or uri>".bold()
    )
}

/// Operator text for a session notice.
pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::AlreadyConnected => "Already Connected".to_string(),
        Notice::NotConnected => "Not Connected.".to_string(),
        Notice::AssignedId(id) => format!("Assigned ID#{id}"),
        Notice::ProtocolWarning { received } => {
            format!("Expected Client ID from server, received {received}")
        }
        Notice::FromServer(text) => format!("\nFrom server: {text}"),
        Notice::ConnectionRefused { target } => {
            format!("{} to {target}", "Error: Connection Refused".red())
        }
        Notice::ConnectionReset => "Error: Connection remotely reset.".red().to_string(),
        Notice::TransportError(message) => format!("{} {message}", "Error:".red()),
        Notice::Disconnected => "Disconnected from server.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socktest_core::ClientId;

    #[test]
    fn test_parse_connect_aliases() {
        for line in ["/connect", "/conn", "/c", "/CONN", "  /c  "] {
            assert_eq!(ClientCommand::parse(line), ClientCommand::Connect, "{line}");
        }
    }

    #[test]
    fn test_parse_disconnect_and_quit_aliases() {
        for line in ["/disconnect", "/disc", "/d"] {
            assert_eq!(ClientCommand::parse(line), ClientCommand::Disconnect);
        }
        assert_eq!(ClientCommand::parse("/quit"), ClientCommand::Quit);
        assert_eq!(ClientCommand::parse("/Exit"), ClientCommand::Quit);
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            ClientCommand::parse("/set addr Example.com"),
            ClientCommand::SetAddr("Example.com".to_string())
        );
        assert_eq!(
            ClientCommand::parse("/SET PORT 9000"),
            ClientCommand::SetPort("9000".to_string())
        );
        assert_eq!(ClientCommand::parse("/set"), ClientCommand::SetUsage);
        assert_eq!(ClientCommand::parse("/set port"), ClientCommand::SetUsage);
        assert_eq!(ClientCommand::parse("/set color red"), ClientCommand::SetUsage);
    }

    #[test]
    fn test_parse_plain_lines_are_sent_unchanged() {
        assert_eq!(ClientCommand::parse(""), ClientCommand::Empty);
        assert_eq!(ClientCommand::parse("   "), ClientCommand::Empty);
        assert_eq!(
            ClientCommand::parse("Hello World "),
            ClientCommand::Send("Hello World ".to_string())
        );
        assert_eq!(
            ClientCommand::parse("/unknown thing"),
            ClientCommand::Send("/unknown thing".to_string())
        );
    }

    #[test]
    fn test_render_notices() {
        assert_eq!(render_notice(&Notice::AssignedId(ClientId::new(4))), "Assigned ID#4");
        assert_eq!(
            render_notice(&Notice::ProtocolWarning {
                received: "abc".to_string()
            }),
            "Expected Client ID from server, received abc"
        );
        assert!(render_notice(&Notice::FromServer("hi".to_string())).ends_with("From server: hi"));
        assert!(render_notice(&Notice::ConnectionRefused {
            target: "127.0.0.1 4242".to_string()
        })
        .ends_with(" to 127.0.0.1 4242"));
        assert_eq!(render_notice(&Notice::NotConnected), "Not Connected.");
    }

    #[test]
    fn test_render_status() {
        let status = SessionStatus {
            addr: "127.0.0.1".to_string(),
            port: 4242,
            identity: Some(ClientId::new(2)),
        };
        assert!(render_status(&status).ends_with("4242 ID#: 2"));

        let status = SessionStatus {
            identity: None,
            ..status
        };
        assert!(render_status(&status).contains("Not connected"));
    }

    #[test]
    fn test_clear_screen_is_escape_sequence() {
        assert!(clear_screen().starts_with('\x1b'));
    }

    #[tokio::test]
    async fn test_console_offline_commands() {
        let mut session =
            ClientSession::new(socktest_core::Endpoint::new("127.0.0.1", 4242).unwrap());
        let input = tokio::io::BufReader::new(
            &b"/info\nhello\n/disc\n/set port 70000\n/set port 9000\n/set\n/quit\n/info\n"[..],
        );
        let mut output = Vec::new();

        run_console(input, &mut output, &mut session).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Not connected"));
        assert_eq!(text.matches("Not Connected.").count(), 2);
        assert!(text.contains("Invalid port number"));
        assert!(text.contains("Set port to 9000"));
        assert!(text.contains("Usage"));
        assert!(text.ends_with("Shutting Down...\n"));
        assert_eq!(session.endpoint().port(), 9000);
    }

    #[test]
    fn test_menu_lists_commands() {
        let menu = menu();
        for command in ["/conn", "/disc", "/exit", "/set", "/help", "/info", "/quit"] {
            assert!(menu.contains(command), "{command}");
        }
    }
}
