//! Host list ingestion: one `host,username,password` record per line.

use std::path::Path;

use log::debug;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Result;

/// Credentials for one device. Empty username/password fall back to the
/// run's defaults.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub host: String,
    pub username: String,
    pub password: SecretString,
}

impl HostRecord {
    /// Create a record.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Whether the record carries its own password.
    pub fn has_password(&self) -> bool {
        !self.password.expose_secret().is_empty()
    }
}

/// Parse a host list.
///
/// Lines starting with `#` or `//` are comments. Lines that do not split
/// into exactly three comma-separated fields, or whose host is empty, are
/// skipped.
pub fn parse_hosts(text: &str) -> Vec<HostRecord> {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            if line.starts_with('#') || line.starts_with("//") || line.trim().is_empty() {
                return None;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let [host, username, password] = fields.as_slice() else {
                debug!("hosts line {}: expected 3 fields, got {}", n + 1, fields.len());
                return None;
            };
            let host = host.trim();
            if host.is_empty() {
                debug!("hosts line {}: empty host", n + 1);
                return None;
            }
            Some(HostRecord::new(host, username.trim_end(), password.trim_end()))
        })
        .collect()
}

/// Read and parse a host list file.
pub fn load_hosts(path: impl AsRef<Path>) -> Result<Vec<HostRecord>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(parse_hosts(&text))
}
