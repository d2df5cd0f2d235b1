//! ScreenOS shell driver.

use std::time::Duration;

use log::{debug, info, warn};

use super::Driver;
use super::response::Response;
use crate::channel::{PtyChannel, PtyConfig, Teardown};
use crate::error::{DriverError, Result};
use crate::transport::ByteChannel;

/// Disable the pager so long outputs arrive without `--- more ---` stops.
pub const DISABLE_PAGING: &str = "set console page 0";

/// Restore the default pager length.
pub const ENABLE_PAGING: &str = "set console page 20";

/// Log out every other administrative session.
pub const CLEAR_ADMIN: &str = "clear admin all";

/// Leave the shell.
pub const EXIT: &str = "exit";

/// Housekeeping choices for a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Run `clear admin all` after login.
    pub clear_admin_sessions: bool,

    /// Answer `y` if `exit` asks to save a modified configuration.
    pub save_on_exit: bool,
}

/// Driver for a NetScreen/ScreenOS device shell.
///
/// Generic over the byte channel so the same session logic runs over SSH
/// or over a scripted channel in tests.
pub struct NetScreenDriver<C> {
    /// Host this session talks to, for log context.
    host: String,

    /// Shell channel (None once closed).
    channel: Option<PtyChannel<C>>,

    /// Housekeeping choices.
    options: SessionOptions,

    /// Whether `open()` completed.
    opened: bool,
}

impl<C: ByteChannel> NetScreenDriver<C> {
    /// Wrap a connected channel. Call [`Driver::open`] before sending commands.
    pub fn new(host: impl Into<String>, channel: C, config: PtyConfig, options: SessionOptions) -> Self {
        Self {
            host: host.into(),
            channel: Some(PtyChannel::new(channel, config)),
            options,
            opened: false,
        }
    }

    /// Host this driver is connected to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Set the per-exchange deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        if let Some(pty) = self.channel.as_mut() {
            pty.set_timeout(timeout);
        }
    }

    fn pty(&mut self) -> Result<&mut PtyChannel<C>> {
        if !self.opened {
            return Err(DriverError::NotConnected.into());
        }
        self.channel
            .as_mut()
            .ok_or_else(|| DriverError::NotConnected.into())
    }

    async fn teardown(pty: &mut PtyChannel<C>, options: &SessionOptions) -> Result<()> {
        pty.run_silent(ENABLE_PAGING, 1).await?;
        match pty.run_teardown(EXIT, options.save_on_exit).await? {
            Teardown::Answered(true) => info!("saved modified configuration on exit"),
            Teardown::Answered(false) => warn!("discarded modified configuration on exit"),
            Teardown::Prompt | Teardown::Closed => {}
        }
        Ok(())
    }
}

impl<C: ByteChannel> Driver for NetScreenDriver<C> {
    async fn open(&mut self) -> Result<()> {
        if self.opened {
            return Err(DriverError::AlreadyConnected.into());
        }
        let pty = self.channel.as_mut().ok_or(DriverError::NotConnected)?;

        let prompt = pty.read_until_prompt().await?;
        debug!("{}: logged in, prompt {:?}", self.host, prompt);

        pty.run_silent(DISABLE_PAGING, 1).await?;
        if self.options.clear_admin_sessions {
            pty.run_silent(CLEAR_ADMIN, 1).await?;
        }

        self.opened = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut pty) = self.channel.take() else {
            return Ok(());
        };

        let teardown = if std::mem::replace(&mut self.opened, false) {
            Self::teardown(&mut pty, &self.options).await
        } else {
            Ok(())
        };
        if let Err(ref e) = teardown {
            warn!("{}: teardown failed: {}", self.host, e);
        }

        let closed = pty.close().await;
        teardown.and(closed)
    }

    async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.pty()?.run(command).await
    }

    async fn send_silent(&mut self, command: &str, prompts: usize) -> Result<()> {
        self.pty()?.run_silent(command, prompts).await
    }

    fn is_open(&self) -> bool {
        self.opened && self.channel.is_some()
    }
}

impl<C> Drop for NetScreenDriver<C> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!("NetScreenDriver for {} dropped without close()", self.host);
        }
    }
}
