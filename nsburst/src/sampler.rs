//! Two-pass per-queue packet counter sampling.
//!
//! Every (ASIC, QMU) pair of the platform is queried once per pass; the two
//! passes are separated by a fixed delay so queue occupancy has time to
//! change. The device is known to hand back a stale value on the first query
//! of a counter, so each query is preceded by a discarded warm-up call.

use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::driver::Driver;
use crate::error::Result;
use crate::platform::{Platform, PlatformRegistry, queues_for};

static PKTCNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^pktcnt\[(\S+)\s+\]\s=\s(0x[0-9a-fA-F]{8})\s+\d*")
        .expect("pktcnt pattern is valid")
});

/// One of the two timed sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Pass {
    First = 0,
    Second = 1,
}

impl Pass {
    /// Both passes, in order.
    pub const ALL: [Pass; 2] = [Pass::First, Pass::Second];

    /// Numeric pass id (0 or 1).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Raw counter values for one queue, one slot per pass.
///
/// `None` means no matching counter line was seen in that pass, which is
/// distinct from a counter that read zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassValues([Option<String>; 2]);

impl PassValues {
    /// Raw `0x`-prefixed value for a pass.
    pub fn get(&self, pass: Pass) -> Option<&str> {
        self.0[pass.index()].as_deref()
    }

    /// Whether both passes were captured.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }
}

/// Counter values keyed by ASIC id, then queue name.
///
/// Entries appear in the order they were first recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    cells: IndexMap<u32, IndexMap<String, PassValues>>,
}

impl CounterSample {
    /// Create an empty sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value. Returns `false` (and keeps the old value) if this
    /// (asic, queue, pass) cell is already set.
    pub fn record(&mut self, asic: u32, queue: &str, pass: Pass, value: impl Into<String>) -> bool {
        let values = self
            .cells
            .entry(asic)
            .or_default()
            .entry(queue.to_string())
            .or_default();
        let slot = &mut values.0[pass.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value.into());
        true
    }

    /// Raw value of a cell, if it was captured.
    pub fn get(&self, asic: u32, queue: &str, pass: Pass) -> Option<&str> {
        self.cells.get(&asic)?.get(queue)?.get(pass)
    }

    /// Iterate over (asic, queue, values) in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, &PassValues)> {
        self.cells.iter().flat_map(|(asic, queues)| {
            queues
                .iter()
                .map(move |(queue, values)| (*asic, queue.as_str(), values))
        })
    }

    /// Number of (asic, queue) cells with at least one value.
    pub fn len(&self) -> usize {
        self.cells.values().map(IndexMap::len).sum()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sampling parameters.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Delay between the two passes.
    pub interval: Duration,

    /// Return every raw counter line as a diagnostic.
    pub verbose: bool,

    /// Send each counter command once and discard the response before the
    /// query that is kept.
    pub warm_up: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            verbose: false,
            warm_up: true,
        }
    }
}

/// Walks a platform's counter topology twice and collects the values.
#[derive(Debug, Clone, Default)]
pub struct CounterSampler {
    config: SamplerConfig,
}

impl CounterSampler {
    /// Create a sampler.
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample the platform named `product`.
    ///
    /// An unknown product yields an empty sample without touching the device.
    pub async fn sample<D: Driver>(
        &self,
        driver: &mut D,
        product: &str,
    ) -> Result<(CounterSample, Vec<String>)> {
        match PlatformRegistry::global().get(product) {
            Some(platform) => self.sample_platform(driver, &platform).await,
            None => {
                debug!("skipping counters: no topology for {:?}", product);
                Ok((CounterSample::new(), Vec::new()))
            }
        }
    }

    /// Sample a resolved platform.
    ///
    /// Returns the sample and, when verbose, every raw response line.
    pub async fn sample_platform<D: Driver>(
        &self,
        driver: &mut D,
        platform: &Platform,
    ) -> Result<(CounterSample, Vec<String>)> {
        let mut sample = CounterSample::new();
        let mut diagnostics = Vec::new();

        for pass in Pass::ALL {
            if pass == Pass::Second {
                debug!("waiting {:?} before second pass", self.config.interval);
                tokio::time::sleep(self.config.interval).await;
            }

            for &asic in platform.topology.asic_ids {
                for &qmu in platform.topology.qmu_ids {
                    let command = platform.command.render(asic, qmu);
                    if self.config.warm_up {
                        driver.send_command(&command).await?;
                    }
                    let response = driver.send_command(&command).await?;

                    if self.config.verbose {
                        diagnostics.extend(response.lines().map(str::to_string));
                    }

                    let Some(queues) = queues_for(qmu) else {
                        warn!("{}: QMU {} has no queue table entry", platform.product, qmu);
                        continue;
                    };
                    for (queue, value) in parse_counters(&response.result, queues) {
                        if !sample.record(asic, queue, pass, value) {
                            debug!("asic {} queue {} pass {:?}: keeping first value", asic, queue, pass);
                        }
                    }
                }
            }
        }

        info!(
            "{}: sampled {} queue(s) over {} ASIC(s)",
            platform.product,
            sample.len(),
            platform.topology.asic_ids.len()
        );
        Ok((sample, diagnostics))
    }
}

/// Extract `(queue, raw value)` pairs for the given queues from counter output.
///
/// Lines look like `pktcnt[CPU1-d   ] = 0x0000001a   26`; only the hex field
/// is kept. Lines for other queues and malformed lines are ignored.
pub fn parse_counters<'q>(output: &str, queues: &[&'q str]) -> Vec<(&'q str, String)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = PKTCNT_RE.captures(line)?;
            let queue = queues.iter().find(|q| **q == &caps[1])?;
            Some((*queue, caps[2].to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PtyConfig;
    use crate::driver::{NetScreenDriver, SessionOptions};
    use crate::platform::{CounterCommand, Topology};
    use crate::transport::MockChannel;

    const LAB: Platform = Platform {
        product: "lab",
        topology: Topology {
            asic_ids: &[0, 1],
            qmu_ids: &[1, 2],
        },
        command: CounterCommand::Ns5400III,
    };

    fn quick() -> CounterSampler {
        CounterSampler::new(SamplerConfig {
            interval: Duration::ZERO,
            ..Default::default()
        })
    }

    async fn open(mock: &MockChannel) -> NetScreenDriver<MockChannel> {
        let mut driver = NetScreenDriver::new(
            "lab",
            mock.clone(),
            PtyConfig {
                timeout: Duration::from_millis(200),
                ..Default::default()
            },
            SessionOptions::default(),
        );
        driver.open().await.unwrap();
        driver
    }

    #[test]
    fn test_parse_counters_keeps_hex_field() {
        let values = parse_counters("pktcnt[X   ] = 0xAABBCCDD   12345\n", &["X"]);
        assert_eq!(values, vec![("X", "0xAABBCCDD".to_string())]);
    }

    #[test]
    fn test_parse_counters_filters_queues() {
        let output = "\
qmu 2 packet counters:
pktcnt[CPU1-d   ] = 0x0000001a   26
pktcnt[RSM1-d   ] = 0x00000000   0
pktcnt[OTHER-d  ] = 0x00000005   5
pktcnt[RSM1-d] = 0x00000009   9
pktcnt[CPU1-d   ] = 0x1a   26
";
        let values = parse_counters(output, &["CPU1-d", "RSM1-d"]);
        assert_eq!(
            values,
            vec![
                ("CPU1-d", "0x0000001a".to_string()),
                ("RSM1-d", "0x00000000".to_string())
            ]
        );
    }

    #[test]
    fn test_record_at_most_once() {
        let mut sample = CounterSample::new();
        assert!(sample.record(1, "L2Q-d", Pass::First, "0x00000001"));
        assert!(!sample.record(1, "L2Q-d", Pass::First, "0x00000002"));
        assert_eq!(sample.get(1, "L2Q-d", Pass::First), Some("0x00000001"));
        assert_eq!(sample.get(1, "L2Q-d", Pass::Second), None);
        assert_eq!(sample.len(), 1);
    }

    #[tokio::test]
    async fn test_sample_fixed_topology() {
        let mock = MockChannel::new("lab->");
        for asic in [0, 1] {
            mock.respond(
                &format!("get asic {asic} engine qmu pktcnt 1"),
                "pktcnt[CPU2-d   ] = 0x00000010   16",
            );
            mock.respond(
                &format!("get asic {asic} engine qmu pktcnt 2"),
                "pktcnt[CPU1-d   ] = 0x00000004   4\npktcnt[RSM1-d   ] = 0x00000002   2",
            );
        }
        let mut driver = open(&mock).await;

        let (sample, diagnostics) = quick().sample_platform(&mut driver, &LAB).await.unwrap();
        driver.close().await.unwrap();

        assert_eq!(sample.len(), 6);
        assert!(sample.iter().all(|(_, _, values)| values.is_complete()));
        assert_eq!(sample.get(1, "RSM1-d", Pass::Second), Some("0x00000002"));
        assert!(diagnostics.is_empty());
        // warm-up + kept query, per pair, per pass
        assert_eq!(mock.count("get asic 0 engine qmu pktcnt 2"), 4);
    }

    #[tokio::test]
    async fn test_warm_up_response_is_discarded() {
        let mock = MockChannel::new("lab->");
        let command = "get asic engine qmu pktcnt 1";
        mock.respond(command, "pktcnt[CPU2-d   ] = 0x000000ff   255");
        mock.respond(command, "pktcnt[CPU2-d   ] = 0x00000003   3");
        mock.respond(command, "pktcnt[CPU2-d   ] = 0x000000ff   255");
        mock.respond(command, "pktcnt[CPU2-d   ] = 0x00000001   1");
        let mut driver = open(&mock).await;

        let platform = Platform {
            product: "single",
            topology: Topology {
                asic_ids: &[0],
                qmu_ids: &[1],
            },
            command: CounterCommand::SingleAsic,
        };
        let sampler = CounterSampler::new(SamplerConfig {
            interval: Duration::ZERO,
            verbose: true,
            warm_up: true,
        });
        let (sample, diagnostics) = sampler.sample_platform(&mut driver, &platform).await.unwrap();
        driver.close().await.unwrap();

        assert_eq!(sample.get(0, "CPU2-d", Pass::First), Some("0x00000003"));
        assert_eq!(sample.get(0, "CPU2-d", Pass::Second), Some("0x00000001"));
        assert_eq!(diagnostics.len(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_cells_stay_unset() {
        let mock = MockChannel::new("lab->");
        mock.respond("get asic engine qmu pktcnt 1", "pktcnt[CPU2-d   ] = 0x00000003   3");
        mock.respond("get asic engine qmu pktcnt 1", "pktcnt[CPU2-d   ] = 0x00000003   3");
        mock.respond("get asic engine qmu pktcnt 1", "% command error");
        let mut driver = open(&mock).await;

        let platform = Platform {
            product: "single",
            topology: Topology {
                asic_ids: &[0],
                qmu_ids: &[1],
            },
            command: CounterCommand::SingleAsic,
        };
        let (sample, _) = quick().sample_platform(&mut driver, &platform).await.unwrap();
        driver.close().await.unwrap();

        assert_eq!(sample.get(0, "CPU2-d", Pass::First), Some("0x00000003"));
        assert_eq!(sample.get(0, "CPU2-d", Pass::Second), None);
    }

    #[tokio::test]
    async fn test_unknown_product_is_empty() {
        let mock = MockChannel::new("fw->");
        let mut driver = open(&mock).await;

        let (sample, diagnostics) = quick().sample(&mut driver, "SSG-550M").await.unwrap();
        driver.close().await.unwrap();

        assert!(sample.is_empty());
        assert!(diagnostics.is_empty());
        assert_eq!(mock.sent().len(), 3);
    }
}
