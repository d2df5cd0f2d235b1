//! Platform topology: which ASICs and QMUs each product exposes, which
//! queues each QMU reports, and how the counter command is spelled.

mod registry;
mod topology;

pub use registry::{Platform, PlatformRegistry};
pub use topology::{CounterCommand, Topology, queues_for};
