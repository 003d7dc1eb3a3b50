//! Device session abstraction.
//!
//! [`Device`] is the capability set every managed device exposes: connect,
//! disconnect, liveness check, and structured command execution. The runner
//! only ever talks to this trait; the SSH implementation lives in [`ssh`],
//! and tests drive the same seam with scripted fakes.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CommandError, ConnectError, DisconnectError};

pub mod ssh;

pub use ssh::SshDevice;

/// Lifecycle of a management connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// True when a connect attempt may start from this state.
    ///
    /// `Failed` is re-entrant so a bounded retry can call connect again.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Capability set every managed device exposes.
///
/// `parse_command` returns already-structured data as an opaque JSON value;
/// turning raw terminal output into that value is the device implementation's
/// concern, never the runner's.
#[async_trait]
pub trait Device: Send {
    /// The inventory name of the device.
    fn name(&self) -> &str;

    /// Current lifecycle state of the management connection.
    fn state(&self) -> ConnectionState;

    /// Opens the management connection.
    ///
    /// Safe to call again after a failed attempt. A no-op on an already
    /// connected session.
    async fn connect(&mut self) -> Result<(), ConnectError>;

    /// Closes the connection if currently connected; a no-op (not an error)
    /// when already disconnected.
    async fn disconnect(&mut self) -> Result<(), DisconnectError>;

    /// True when the underlying connection is live.
    fn is_connected(&self) -> bool;

    /// Executes a command and returns its structured output.
    async fn parse_command(&mut self, command: &str) -> Result<Value, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::ConnectionState;

    #[test]
    fn fresh_and_failed_handles_may_connect() {
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Failed.can_connect());
    }

    #[test]
    fn live_and_in_flight_handles_may_not_connect() {
        assert!(!ConnectionState::Connected.can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
    }
}
