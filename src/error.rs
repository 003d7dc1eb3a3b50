//! Error types for device sessions, verification, and configuration.
//!
//! The retryable/fatal split for connection errors is decided here, once,
//! via [`ConnectError::is_retryable`]; the connection manager is the only
//! component that acts on it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

use crate::vlan::VlanId;

/// Errors that can occur while bringing up a management session.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Transport-level failure while establishing the link.
    ///
    /// Covers TCP connect, SSH handshake, and the authentication exchange.
    /// These are the transient failures a flapping management network
    /// produces, so the whole class is treated as retryable.
    #[error("transport failure: {0}")]
    Transport(#[from] async_ssh2_tokio::Error),

    /// The attempt did not produce a usable session within the deadline.
    ///
    /// Covers both a stalled handshake and a device that accepts the
    /// connection but never presents a prompt.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Failure while setting up the interactive shell channel.
    #[error("shell channel error: {0}")]
    Channel(#[from] russh::Error),

    /// The shell channel closed before the device presented a prompt.
    #[error("channel closed while waiting for initial prompt")]
    ChannelClosed,
}

impl ConnectError {
    /// True for transient link failures that are safe to retry a bounded
    /// number of times. Anything else aborts the attempt immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Errors that can occur while executing a command on a live session.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command was issued against a session that is not connected.
    #[error("session is not connected")]
    NotConnected,

    /// The shell channel closed mid-command.
    #[error("channel closed during command execution")]
    ChannelClosed,

    /// The command did not complete within the configured timeout.
    ///
    /// Contains the partial output received before the timeout.
    #[error("command timed out: {0}")]
    Timeout(String),

    /// Failed to hand the command to the shell task.
    #[error("failed to send command: {0}")]
    Send(#[from] SendError<String>),

    /// The device's structured output could not be decoded.
    #[error("structured output decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The structured payload decoded, but does not have the expected shape.
    #[error("malformed structured output: {0}")]
    MalformedOutput(String),
}

/// Errors raised while closing a session.
///
/// Always non-fatal: callers log these as warnings and carry on.
#[derive(Error, Debug)]
pub enum DisconnectError {
    /// The exit command could not be delivered to the shell task.
    #[error("failed to deliver exit to the shell: {0}")]
    Send(#[from] SendError<String>),
}

/// Errors raised while loading the testbed inventory.
#[derive(Error, Debug)]
pub enum TestbedError {
    /// The testbed file could not be read.
    #[error("failed to read testbed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The testbed file is not valid YAML for the expected shape.
    #[error("failed to parse testbed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The testbed defines no devices.
    #[error("testbed defines no devices")]
    Empty,

    /// A device entry is structurally valid YAML but unusable.
    #[error("device '{0}': {1}")]
    InvalidDevice(String, String),
}

/// Errors raised while resolving the expected-VLAN configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The resolved expected-VLAN list is empty.
    #[error("expected VLAN list is empty")]
    EmptyExpectedSet,

    /// A supplied VLAN id is not a number.
    #[error("invalid VLAN id '{0}'")]
    InvalidVlanId(String),

    /// A supplied VLAN id is outside the usable 802.1Q range.
    #[error("VLAN id {0} outside 1..=4094")]
    VlanIdOutOfRange(u32),
}

/// Run-level errors produced by the verification flow.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The target device name is absent from the live-session registry.
    #[error("device '{device}' not found in the session registry")]
    DeviceNotFound { device: String },

    /// A device could not be brought up within the retry budget.
    #[error("failed to connect to device '{device}': {source}")]
    Connect {
        device: String,
        #[source]
        source: ConnectError,
    },

    /// VLAN data could not be captured from the target device.
    #[error("failed to capture VLAN data from '{device}': {source}")]
    CommandExecution {
        device: String,
        #[source]
        source: CommandError,
    },

    /// One or more expected VLANs are absent from the device.
    ///
    /// The list preserves the order of the originally supplied expected set.
    #[error("missing VLANs on '{device}': {missing:?}")]
    VerificationFailed {
        device: String,
        missing: Vec<VlanId>,
    },
}
