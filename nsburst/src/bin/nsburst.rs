//! Command-line front end: check one host or a host list for microbursts.
//!
//! ```bash
//! nsburst --host 10.0.0.1 --username netscreen --password secret
//! nsburst --hosts-file firewalls.csv --username netscreen --log-file bursts.log
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;
use secrecy::SecretString;

use nsburst::channel::PtyConfig;
use nsburst::{
    HostKeyVerification, HostRecord, HostReport, LossDirection, RunOptions, SamplerConfig,
    SessionOptions, load_hosts, run_hosts,
};

#[derive(Debug, Parser)]
#[command(name = "nsburst")]
#[command(about = "Detect queue microbursts on ASIC-based NetScreen firewalls")]
struct Args {
    /// Check a single host.
    #[arg(long, conflicts_with = "hosts_file", required_unless_present = "hosts_file")]
    host: Option<String>,

    /// Check every host in a `host,username,password` file.
    #[arg(long, value_name = "PATH")]
    hosts_file: Option<PathBuf>,

    /// Username (default for host-file records that leave it empty).
    #[arg(short, long, default_value = "netscreen")]
    username: String,

    /// Password (default for host-file records that leave it empty).
    #[arg(short, long, env = "NSBURST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// SSH port.
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// Per-command timeout in seconds.
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Connect timeout in seconds.
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,

    /// Seconds between the two counter passes.
    #[arg(long, default_value_t = 2.0)]
    interval: f64,

    /// Print every raw counter line.
    #[arg(short, long)]
    verbose: bool,

    /// Debug logging.
    #[arg(short, long)]
    debug: bool,

    /// Answer `y` if exit asks to save a modified configuration.
    #[arg(long)]
    save_on_exit: bool,

    /// Log out other administrators before sampling.
    #[arg(long)]
    clear_admin: bool,

    /// Hosts checked at the same time.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Count a rising counter as loss instead of a falling one.
    #[arg(long)]
    loss_on_increase: bool,

    /// One JSON document per host instead of report lines.
    #[arg(long)]
    json: bool,

    /// Also append report lines to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Skip host key verification.
    #[arg(long)]
    insecure: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            username: self.username.clone(),
            password: self.password.clone().map(SecretString::from),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            pty: PtyConfig {
                timeout: Duration::from_secs(self.timeout),
                ..Default::default()
            },
            sampler: SamplerConfig {
                interval: Duration::from_secs_f64(self.interval.max(0.0)),
                verbose: self.verbose,
                ..Default::default()
            },
            direction: if self.loss_on_increase {
                LossDirection::Increase
            } else {
                LossDirection::Decrease
            },
            session: SessionOptions {
                clear_admin_sessions: self.clear_admin,
                save_on_exit: self.save_on_exit,
            },
            host_key_verification: if self.insecure {
                HostKeyVerification::Disabled
            } else {
                HostKeyVerification::AcceptNew
            },
            known_hosts_path: None,
            concurrency: self.concurrency,
        }
    }

    fn records(&self) -> nsburst::error::Result<Vec<HostRecord>> {
        match (&self.host, &self.hosts_file) {
            (Some(host), _) => Ok(vec![HostRecord::new(host, "", "")]),
            (None, Some(path)) => load_hosts(path),
            (None, None) => Ok(Vec::new()),
        }
    }
}

fn render(report: &HostReport, json: bool) -> Vec<String> {
    if !json {
        return report.lines();
    }
    let value = match &report.outcome {
        Ok(summary) => serde_json::json!({ "host": report.host, "ok": true, "summary": summary }),
        Err(e) => serde_json::json!({ "host": report.host, "ok": false, "error": e.to_string() }),
    };
    vec![value.to_string()]
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let records = match args.records() {
        Ok(records) => records,
        Err(e) => {
            error!("cannot read host list: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if records.is_empty() {
        error!("no hosts to check");
        return ExitCode::FAILURE;
    }

    let mut log_file = match &args.log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                error!("cannot open {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let reports = run_hosts(&records, &args.run_options()).await;

    for report in &reports {
        for line in render(report, args.json) {
            println!("{}", line);
            if let Some(file) = log_file.as_mut() {
                if let Err(e) = writeln!(file, "{}", line) {
                    error!("log file write failed: {}", e);
                    log_file = None;
                }
            }
        }
    }

    if reports.iter().all(HostReport::is_success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
