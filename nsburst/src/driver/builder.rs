//! Builder for creating device drivers.

use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use secrecy::SecretString;

use super::Driver;
use super::netscreen::{NetScreenDriver, SessionOptions};
use crate::channel::PtyConfig;
use crate::error::{DriverError, Result};
use crate::transport::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::transport::{ByteChannel, SshShell};

/// Builder for constructing device drivers.
///
/// # Example
///
/// ```rust,no_run
/// use nsburst::driver::{Driver, DriverBuilder};
///
/// # async fn example() -> Result<(), nsburst::Error> {
/// let mut driver = DriverBuilder::new("192.168.1.1")
///     .username("netscreen")
///     .password("secret")
///     .connect()
///     .await?;
///
/// let response = driver.send_command("get system").await?;
/// println!("{}", response.result);
/// driver.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Duration,
    pty: PtyConfig,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    session: SessionOptions,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            timeout: Duration::from_secs(5),
            pty: PtyConfig::default(),
            terminal_width: 80,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            session: SessionOptions::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::password(password);
        self
    }

    /// Set password authentication from an already-wrapped secret.
    pub fn secret_password(mut self, password: SecretString) -> Self {
        self.auth = AuthMethod::Password(password);
        self
    }

    /// Set the connect timeout (default: 5s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-command deadline (default: 30s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.pty.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set session housekeeping options.
    pub fn session_options(mut self, options: SessionOptions) -> Self {
        self.session = options;
        self
    }

    /// Build the SSH configuration this builder describes.
    pub fn ssh_config(&self) -> Result<SshConfig> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| DriverError::InvalidConfig {
                message: "Username is required".to_string(),
            })?;

        Ok(SshConfig {
            host: self.host.clone(),
            port: self.port,
            username,
            auth: self.auth.clone(),
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
        })
    }

    /// Wrap an existing channel. The returned driver is not yet opened.
    pub fn with_channel<C: ByteChannel>(self, channel: C) -> NetScreenDriver<C> {
        NetScreenDriver::new(self.host, channel, self.pty, self.session)
    }

    /// Connect over SSH and open the session.
    pub async fn connect(self) -> Result<NetScreenDriver<SshShell>> {
        let config = self.ssh_config()?;
        let shell = SshShell::connect(config).await?;
        let mut driver = self.with_channel(shell);

        if let Err(e) = driver.open().await {
            if let Err(close_err) = driver.close().await {
                warn!("{}: close after failed open: {}", driver.host(), close_err);
            }
            return Err(e);
        }

        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockChannel;

    #[test]
    fn test_username_required() {
        let err = DriverBuilder::new("fw1").password("x").ssh_config().unwrap_err();
        assert!(err.to_string().contains("Username is required"));
    }

    #[test]
    fn test_ssh_config() {
        let config = DriverBuilder::new("fw1")
            .port(2222)
            .username("netscreen")
            .password("secret")
            .host_key_verification(HostKeyVerification::Disabled)
            .ssh_config()
            .unwrap();
        assert_eq!(config.socket_addr(), "fw1:2222");
        assert_eq!(config.username, "netscreen");
        assert!(matches!(config.auth, AuthMethod::Password(_)));
        assert_eq!(config.host_key_verification, HostKeyVerification::Disabled);
    }

    #[tokio::test]
    async fn test_with_channel() {
        let mock = MockChannel::new("fw->");
        let mut driver = DriverBuilder::new("fw1")
            .command_timeout(Duration::from_millis(200))
            .with_channel(mock.clone());
        assert!(!driver.is_open());
        driver.open().await.unwrap();
        assert_eq!(driver.host(), "fw1");
        driver.close().await.unwrap();
    }
}
