//! Error types for nsburst.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for nsburst operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/facts errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Local I/O (host list, log file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error is a protocol timeout (no prompt before the deadline).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::ProtocolTimeout(_)))
    }

    /// Whether this error came from establishing the connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// The server presented a key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Strict verification and the host is not in known_hosts
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Reading or writing known_hosts failed
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Connect timed out
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (framing and prompt detection).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open the shell channel
    #[error("Failed to open shell channel: {0}")]
    ShellOpenFailed(#[source] russh::Error),

    /// No prompt matched within the exchange deadline
    #[error("No prompt matched within {0:?}")]
    ProtocolTimeout(Duration),

    /// Channel closed before the exchange completed
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),
}

/// Driver layer errors.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Driver not connected
    #[error("Driver not connected - call open() first")]
    NotConnected,

    /// Driver already connected
    #[error("Driver already connected")]
    AlreadyConnected,

    /// Invalid configuration in the driver builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Errors about the device platform and its facts.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// `get system` produced no product name
    #[error("Failed to fetch system facts about host: {host}")]
    FactsUnavailable { host: String },

    /// Product name has no topology entry
    #[error("Unknown platform '{product}'")]
    UnknownPlatform { product: String },
}

/// Result type alias using nsburst's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_timeout() {
        let err: Error = ChannelError::ProtocolTimeout(Duration::from_secs(3)).into();
        assert!(err.is_timeout());
        assert!(!err.is_connection());
        assert_eq!(err.to_string(), "Channel error: No prompt matched within 3s");
    }

    #[test]
    fn test_shell_open_failure_keeps_cause() {
        let err = ChannelError::ShellOpenFailed(russh::Error::Disconnect);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source, Some(russh::Error::Disconnect.to_string()));
        assert!(err.to_string().starts_with("Failed to open shell channel: "));
    }

    #[test]
    fn test_facts_unavailable_message() {
        let err: Error = PlatformError::FactsUnavailable {
            host: "10.0.0.1".into(),
        }
        .into();
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("Failed to fetch system facts about host: 10.0.0.1"));
    }
}
