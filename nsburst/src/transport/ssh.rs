//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::ByteChannel;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{ChannelError, Result, TransportError};

/// SSH transport wrapping the russh client session.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    ///
    /// `config.timeout` bounds the handshake and authentication together.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let timeout = config.timeout;
        tokio::time::timeout(timeout, Self::establish(config))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    async fn establish(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());

        let mut session =
            client::connect(ssh_config, (config.host.as_str(), config.port), handler)
                .await
                .map_err(|e| {
                    // Prefer the detailed host key error over russh's generic UnknownKey
                    let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
                    match (stored, e) {
                        (Some(hk_err), _) => hk_err,
                        (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                            host: config.host.clone(),
                            port: config.port,
                            source,
                        },
                        (None, e) => TransportError::Ssh(e),
                    }
                })?;

        Self::authenticate(&mut session, &config).await?;

        Ok(Self { session, config })
    }

    /// Open a vt100 PTY channel and start an interactive shell on it.
    ///
    /// Bounded by the connect timeout.
    pub async fn open_shell(&self) -> Result<Channel<Msg>> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.request_shell())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    async fn request_shell(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(ChannelError::ShellOpenFailed)?;

        channel
            .request_pty(
                true,
                "vt100",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(ChannelError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(ChannelError::Ssh)?;

        Ok(channel)
    }

    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// An interactive shell on an SSH session, exposed as a [`ByteChannel`].
///
/// Data from the server arrives in SSH-message-sized pieces; anything beyond
/// the caller's `max_bytes` is held back for the next `recv`.
pub struct SshShell {
    transport: Option<SshTransport>,
    channel: Channel<Msg>,
    pending: BytesMut,
    eof: bool,
}

impl SshShell {
    /// Connect, authenticate, and start the shell.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let transport = SshTransport::connect(config).await?;
        let channel = transport.open_shell().await?;
        Ok(Self {
            transport: Some(transport),
            channel,
            pending: BytesMut::with_capacity(4096),
            eof: false,
        })
    }
}

impl ByteChannel for SshShell {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.eof {
            return Err(ChannelError::Closed.into());
        }
        self.channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn recv(&mut self, max_bytes: usize) -> Result<Option<Bytes>> {
        while self.pending.is_empty() {
            if self.eof {
                return Ok(None);
            }
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => self.pending.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    self.pending.extend_from_slice(&data)
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    debug!("shell channel closed by peer");
                    self.eof = true;
                }
                Some(other) => trace!("ignoring channel message: {:?}", other),
            }
        }

        let n = max_bytes.max(1).min(self.pending.len());
        Ok(Some(self.pending.split_to(n).freeze()))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.eof {
            // The device may already have torn the channel down after `exit`
            if let Err(e) = self.channel.close().await {
                debug!("channel close: {}", e);
            }
            self.eof = true;
        }
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }
}

impl Drop for SshShell {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!("SshShell dropped without close()");
        }
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use russh::keys::ssh_key::rand_core::OsRng;
    use russh::keys::{Algorithm, PrivateKey};
    use russh::server::{self, Auth};

    use super::*;
    use crate::error::Error;

    /// Completes the key exchange, then never answers password authentication.
    struct StalledAuthServer;

    impl server::Handler for StalledAuthServer {
        type Error = russh::Error;

        async fn auth_password(
            &mut self,
            _user: &str,
            _password: &str,
        ) -> std::result::Result<Auth, Self::Error> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_authentication_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server_config = Arc::new(server::Config {
            keys: vec![PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap()],
            ..Default::default()
        });
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            if let Ok(session) = server::run_stream(server_config, socket, StalledAuthServer).await {
                let _ = session.await;
            }
        });

        let mut config = SshConfig::new("127.0.0.1", "netscreen", AuthMethod::password("secret"));
        config.port = port;
        config.timeout = Duration::from_millis(500);
        config.host_key_verification = HostKeyVerification::Disabled;

        let start = Instant::now();
        let err = match SshShell::connect(config).await {
            Ok(_) => panic!("authentication should not complete"),
            Err(e) => e,
        };
        assert!(
            matches!(err, Error::Transport(TransportError::Timeout(_))),
            "unexpected error: {err}"
        );
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
