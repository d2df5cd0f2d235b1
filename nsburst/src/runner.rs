//! Per-host pipeline and multi-host orchestration.
//!
//! Every failure is contained at the host boundary: a host that cannot be
//! reached, times out, or reports no facts is recorded as failed and the run
//! moves on. Nothing is retried.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use log::{info, warn};
use secrecy::SecretString;
use serde::Serialize;

use crate::channel::PtyConfig;
use crate::diff::{DiffResult, LossDirection, diff_with};
use crate::driver::{Driver, DriverBuilder, SessionOptions};
use crate::error::{Error, PlatformError, Result};
use crate::facts::{self, DeviceFacts};
use crate::hosts::HostRecord;
use crate::sampler::{CounterSampler, SamplerConfig};
use crate::transport::HostKeyVerification;

/// Settings shared by every host in a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Username for records that leave it empty.
    pub username: String,

    /// Password for records that leave it empty.
    pub password: Option<SecretString>,

    /// SSH port.
    pub port: u16,

    /// Connect timeout.
    pub connect_timeout: Duration,

    /// Per-exchange deadline and read size.
    pub pty: PtyConfig,

    /// Counter sampling parameters.
    pub sampler: SamplerConfig,

    /// Which counter movement counts as loss.
    pub direction: LossDirection,

    /// Session housekeeping.
    pub session: SessionOptions,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Custom known_hosts file.
    pub known_hosts_path: Option<PathBuf>,

    /// Hosts processed at the same time. 1 keeps the run strictly sequential.
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            port: 22,
            connect_timeout: Duration::from_secs(5),
            pty: PtyConfig::default(),
            sampler: SamplerConfig::default(),
            direction: LossDirection::default(),
            session: SessionOptions::default(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            concurrency: 1,
        }
    }
}

impl RunOptions {
    /// Driver builder for one record, with empty credentials backfilled.
    pub fn builder_for(&self, record: &HostRecord) -> DriverBuilder {
        let username = if record.username.is_empty() {
            self.username.clone()
        } else {
            record.username.clone()
        };
        let password = match (&self.password, record.has_password()) {
            (Some(default), false) => default.clone(),
            _ => record.password.clone(),
        };

        let mut builder = DriverBuilder::new(&record.host)
            .port(self.port)
            .username(username)
            .secret_password(password)
            .timeout(self.connect_timeout)
            .command_timeout(self.pty.timeout)
            .host_key_verification(self.host_key_verification.clone())
            .session_options(self.session.clone());
        if let Some(path) = &self.known_hosts_path {
            builder = builder.known_hosts_path(path);
        }
        builder
    }
}

/// Everything learned from one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostSummary {
    pub host: String,
    pub facts: DeviceFacts,
    pub diff: DiffResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl HostSummary {
    /// Name used in report lines: the device hostname, or the address.
    pub fn display_name(&self) -> &str {
        if self.facts.hostname.is_empty() {
            &self.host
        } else {
            &self.facts.hostname
        }
    }

    /// Raw diagnostics followed by one line per compared queue.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = self.diagnostics.clone();
        lines.extend(self.diff.report_lines(self.display_name()));
        lines
    }
}

/// Outcome for one host.
#[derive(Debug)]
pub struct HostReport {
    pub host: String,
    pub outcome: Result<HostSummary>,
}

impl HostReport {
    /// Whether the host was checked end to end.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Final status line for the host.
    pub fn banner(&self) -> String {
        match &self.outcome {
            Ok(summary) => format!(
                "Host {}: check completed ({} queue(s) compared, {} with loss)",
                self.host,
                summary.diff.len(),
                summary.diff.losses().count()
            ),
            Err(Error::Platform(e @ PlatformError::FactsUnavailable { .. })) => e.to_string(),
            Err(e) => format!("Host {}: failed: {}", self.host, e),
        }
    }

    /// Report lines followed by the banner.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = match &self.outcome {
            Ok(summary) => summary.report_lines(),
            Err(_) => Vec::new(),
        };
        lines.push(self.banner());
        lines
    }
}

/// Gather facts, sample counters and diff them on an opened driver.
///
/// Fails with [`PlatformError::FactsUnavailable`] when the device reports no
/// product. An unknown product gives an empty diff.
pub async fn check_device<D: Driver>(
    driver: &mut D,
    host: &str,
    options: &RunOptions,
) -> Result<HostSummary> {
    let facts = facts::extract(driver).await?;
    if !facts.is_available() {
        return Err(PlatformError::FactsUnavailable {
            host: host.to_string(),
        }
        .into());
    }
    info!("{}: {} running {}", host, facts.product, facts.version);

    let sampler = CounterSampler::new(options.sampler.clone());
    let (sample, diagnostics) = sampler.sample(driver, &facts.product).await?;
    let diff = diff_with(&sample, options.direction);

    Ok(HostSummary {
        host: host.to_string(),
        facts,
        diff,
        diagnostics,
    })
}

/// Run the check on an opened driver and always close it afterwards.
pub async fn run_driver<D: Driver>(mut driver: D, host: &str, options: &RunOptions) -> HostReport {
    let outcome = check_device(&mut driver, host, options).await;
    if let Err(e) = driver.close().await {
        warn!("{}: close failed: {}", host, e);
    }
    HostReport {
        host: host.to_string(),
        outcome,
    }
}

/// Connect to one host over SSH and check it.
pub async fn run_host(record: &HostRecord, options: &RunOptions) -> HostReport {
    info!("{}: connecting", record.host);
    match options.builder_for(record).connect().await {
        Ok(driver) => run_driver(driver, &record.host, options).await,
        Err(e) => HostReport {
            host: record.host.clone(),
            outcome: Err(e),
        },
    }
}

/// Check every host, at most `options.concurrency` at a time.
///
/// Reports come back in input order.
pub async fn run_hosts(records: &[HostRecord], options: &RunOptions) -> Vec<HostReport> {
    in_order(
        records.iter().map(|record| run_host(record, options)),
        options.concurrency,
    )
    .await
}

/// Check drivers that are already open, each labelled with its host.
///
/// Same ordering and concurrency rules as [`run_hosts`]; every driver is
/// closed afterwards.
pub async fn run_drivers<D: Driver>(
    drivers: Vec<(String, D)>,
    options: &RunOptions,
) -> Vec<HostReport> {
    in_order(
        drivers
            .into_iter()
            .map(|(host, driver)| async move { run_driver(driver, &host, options).await }),
        options.concurrency,
    )
    .await
}

async fn in_order<I, F>(checks: I, concurrency: usize) -> Vec<HostReport>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = HostReport>,
{
    stream::iter(checks)
        .buffered(concurrency.max(1))
        .collect()
        .await
}
