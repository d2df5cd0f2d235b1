//! SSH transport layer wrapping russh.
//!
//! This module provides connection setup and authentication, and the
//! [`ByteChannel`] seam the session protocol engine reads and writes through.

pub mod config;
mod ssh;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::{SshShell, SshTransport};

#[cfg(any(test, feature = "testing"))]
pub use mock::MockChannel;

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

/// A duplex byte channel to an interactive device shell.
///
/// The channel is exclusively owned by one session for its lifetime.
pub trait ByteChannel: Send {
    /// Write raw bytes to the shell.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait until output is available and return at most `max_bytes` of it.
    ///
    /// Returns `Ok(None)` once the remote side has closed the channel.
    fn recv(&mut self, max_bytes: usize) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Close the channel (and any session that owns it).
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
