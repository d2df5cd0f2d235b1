//! High-level driver for device interaction.
//!
//! The driver owns one shell session for its lifetime and runs commands on
//! it strictly one at a time.

mod builder;
mod netscreen;
pub(crate) mod response;

pub use builder::DriverBuilder;
pub use netscreen::{NetScreenDriver, SessionOptions};
pub use response::Response;

use std::future::Future;

use crate::error::Result;

/// Trait for device drivers.
pub trait Driver: Send {
    /// Prepare the session: wait for the login prompt and run the
    /// housekeeping commands.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Undo housekeeping, leave the shell, and close the channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Send a command and capture its output up to the prompt.
    fn send_command(&mut self, command: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Send a command whose output is not needed and wait for `prompts`
    /// prompt lines.
    fn send_silent(
        &mut self,
        command: &str,
        prompts: usize,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Check if the driver is connected and opened.
    fn is_open(&self) -> bool;
}
