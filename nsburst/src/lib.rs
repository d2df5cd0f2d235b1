//! # nsburst
//!
//! Microburst detection for ASIC-based NetScreen firewalls.
//!
//! nsburst logs in to a device over SSH, reads its system facts, and samples
//! the per-ASIC, per-queue packet counters twice, two seconds apart. A queue
//! whose counter went down between the two samples filled and drained in
//! between: a transient burst.
//!
//! ## Layers
//!
//! - [`transport`]: SSH connection and the [`transport::ByteChannel`] seam
//! - [`channel`]: line framing, prompt detection, command/response exchanges
//! - [`driver`]: session lifecycle and the [`Driver`] trait
//! - [`platform`]: ASIC/QMU/queue topology per product
//! - [`facts`], [`sampler`], [`diff`]: the measurement itself
//! - [`runner`]: per-host pipeline with failure containment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nsburst::{HostRecord, RunOptions, run_hosts};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hosts = vec![HostRecord::new("192.168.1.1", "netscreen", "secret")];
//!     for report in run_hosts(&hosts, &RunOptions::default()).await {
//!         for line in report.lines() {
//!             println!("{}", line);
//!         }
//!     }
//! }
//! ```

pub mod channel;
pub mod diff;
pub mod driver;
pub mod error;
pub mod facts;
pub mod hosts;
pub mod platform;
pub mod runner;
pub mod sampler;
pub mod transport;

// Re-export main types for convenience
pub use diff::{DiffResult, LossDirection, QueueDiff, diff, diff_with};
pub use driver::{Driver, DriverBuilder, NetScreenDriver, Response, SessionOptions};
pub use error::Error;
pub use facts::DeviceFacts;
pub use hosts::{HostRecord, load_hosts, parse_hosts};
pub use platform::{CounterCommand, Platform, PlatformRegistry, Topology};
pub use runner::{
    HostReport, HostSummary, RunOptions, check_device, run_driver, run_drivers, run_host, run_hosts,
};
pub use sampler::{CounterSample, CounterSampler, Pass, SamplerConfig};
pub use transport::{AuthMethod, ByteChannel, HostKeyVerification, SshConfig};
