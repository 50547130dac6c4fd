//! Target/bind endpoint value object.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Default bind/connect address.
pub const DEFAULT_ADDR: &str = "127.0.0.1";

/// Default bind/connect port.
pub const DEFAULT_PORT: u16 = 4242;

/// Environment variable overriding the address when no flag is given.
pub const ENV_ADDR: &str = "SOCKTEST_ADDR";

/// Environment variable overriding the port when no flag is given.
pub const ENV_PORT: &str = "SOCKTEST_PORT";

/// Host and port pair used by both the client and the server.
///
/// The host is kept as text so that names resolve at connect time,
/// not when the operator sets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint, validating both parts.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidAddress` if `addr` is blank
    /// - `DomainError::InvalidPort` if `port` is 0
    pub fn new(addr: impl Into<String>, port: u16) -> DomainResult<Self> {
        let addr = addr.into();
        let addr = validate_addr(&addr)?;
        let port = validate_port(port)?;
        Ok(Self { addr, port })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Replaces the host, keeping the port.
    pub fn set_addr(&mut self, addr: &str) -> DomainResult<()> {
        self.addr = validate_addr(addr)?;
        Ok(())
    }

    /// Replaces the port from operator text such as `"4242"`.
    pub fn set_port_str(&mut self, port: &str) -> DomainResult<()> {
        self.port = parse_port(port)?;
        Ok(())
    }

    /// Resolves the startup endpoint.
    ///
    /// Precedence per part: explicit flag, then the environment
    /// (`SOCKTEST_ADDR` / `SOCKTEST_PORT` via `lookup`), then the default.
    pub fn resolve<F>(addr: Option<String>, port: Option<u16>, lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut endpoint = Self::default();

        if let Some(addr) = addr.or_else(|| lookup(ENV_ADDR)) {
            endpoint.set_addr(&addr)?;
        }

        match port {
            Some(port) => endpoint.port = validate_port(port)?,
            None => {
                if let Some(port) = lookup(ENV_PORT) {
                    endpoint.set_port_str(&port)?;
                }
            }
        }

        Ok(endpoint)
    }

    /// Resolves the startup endpoint against the process environment.
    pub fn from_env(addr: Option<String>, port: Option<u16>) -> DomainResult<Self> {
        Self::resolve(addr, port, |key| std::env::var(key).ok())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bracket bare IPv6 literals so the output stays parseable
        if self.addr.contains(':') {
            write!(f, "[{}]:{}", self.addr, self.port)
        } else {
            write!(f, "{}:{}", self.addr, self.port)
        }
    }
}

/// Parses a port in 1..=65535.
pub fn parse_port(value: &str) -> DomainResult<u16> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|_| DomainError::InvalidPort {
            value: value.to_string(),
        })?;
    validate_port(port)
}

fn validate_port(port: u16) -> DomainResult<u16> {
    if port == 0 {
        return Err(DomainError::InvalidPort {
            value: port.to_string(),
        });
    }
    Ok(port)
}

fn validate_addr(addr: &str) -> DomainResult<String> {
    let trimmed = addr.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return Err(DomainError::InvalidAddress {
            value: addr.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
