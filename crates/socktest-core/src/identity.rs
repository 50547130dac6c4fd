//! Connection identities assigned by the server registry.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::DomainError;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identity the server assigns to an accepted connection.
///
/// Identities come from an append-only sequence starting at 0. A removed
/// connection leaves a gap; survivors are never renumbered and a value is
/// never handed out twice by the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientId(u64);

impl ClientId {
    /// Creates a ClientId from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the identity following this one in the sequence, or
    /// `None` once the sequence is exhausted.
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for ClientId {
    type Err = DomainError;

    /// Parses the decimal form used on the wire.
    ///
    /// Surrounding whitespace is ignored; anything else that is not a
    /// non-negative integer is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::ParseError {
                field: "client id".to_string(),
                reason: format!("{s:?}: {e}"),
            })
    }
}

// ============================================================================
// Connection Snapshot
// ============================================================================

/// Read-only view of a live server-side connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Assigned identity
    pub id: ClientId,

    /// Remote address of the peer
    pub peer: SocketAddr,

    /// When the connection was accepted
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Creates a snapshot stamped with the current time.
    pub fn new(id: ClientId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            connected_at: Utc::now(),
        }
    }

    /// Seconds the connection has been open, relative to `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.connected_at)
            .num_seconds()
            .max(0)
    }
}
