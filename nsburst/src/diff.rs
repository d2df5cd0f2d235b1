//! Compare the two counter passes per queue.
//!
//! The counters are read as point-in-time queue occupancy: a queue whose
//! value dropped between the first and second pass filled and drained in
//! between, which is reported as loss. That reading is an assumption about
//! the hardware, so the opposite convention is available through
//! [`LossDirection::Increase`].

use log::warn;
use serde::Serialize;

use crate::sampler::{CounterSample, Pass};

/// Which movement of the counter between passes counts as loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LossDirection {
    /// Loss when the first pass reads higher than the second.
    #[default]
    Decrease,
    /// Loss when the second pass reads higher than the first.
    Increase,
}

/// Comparison result for one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDiff {
    pub asic_id: u32,
    pub queue: String,
    /// Movement in the loss direction: `pass0 - pass1` for
    /// [`LossDirection::Decrease`], `pass1 - pass0` for `Increase`.
    pub delta: i64,
    pub loss_detected: bool,
}

impl QueueDiff {
    /// Human-readable report line for this queue.
    pub fn report_line(&self, host: &str) -> String {
        if self.loss_detected {
            format!(
                "Packet loss of {} packet(s) detected in ASIC {} within queue {} on host {}",
                self.delta, self.asic_id, self.queue, host
            )
        } else {
            format!(
                "No packet loss detected in ASIC {} within queue {} on host {}",
                self.asic_id, self.queue, host
            )
        }
    }
}

/// Ordered per-queue comparison results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub entries: Vec<QueueDiff>,
}

impl DiffResult {
    /// Queues where loss was detected.
    pub fn losses(&self) -> impl Iterator<Item = &QueueDiff> {
        self.entries.iter().filter(|d| d.loss_detected)
    }

    /// One report line per compared queue.
    pub fn report_lines(&self, host: &str) -> Vec<String> {
        self.entries.iter().map(|d| d.report_line(host)).collect()
    }

    /// Number of compared queues.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no queue had both passes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compare passes with the default [`LossDirection::Decrease`] convention.
pub fn diff(sample: &CounterSample) -> DiffResult {
    diff_with(sample, LossDirection::default())
}

/// Compare passes. Queues missing either pass are left out.
pub fn diff_with(sample: &CounterSample, direction: LossDirection) -> DiffResult {
    let entries = sample
        .iter()
        .filter_map(|(asic, queue, values)| {
            let first = parse_hex(values.get(Pass::First)?)?;
            let second = parse_hex(values.get(Pass::Second)?)?;
            let delta = match direction {
                LossDirection::Decrease => first - second,
                LossDirection::Increase => second - first,
            };
            Some(QueueDiff {
                asic_id: asic,
                queue: queue.to_string(),
                delta,
                loss_detected: delta > 0,
            })
        })
        .collect();

    DiffResult { entries }
}

/// Parse a `0x`-prefixed hex counter.
fn parse_hex(raw: &str) -> Option<i64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    match u32::from_str_radix(digits, 16) {
        Ok(value) => Some(i64::from(value)),
        Err(e) => {
            warn!("unparsable counter value {:?}: {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cells: &[(u32, &str, Option<&str>, Option<&str>)]) -> CounterSample {
        let mut sample = CounterSample::new();
        for (asic, queue, first, second) in cells {
            if let Some(v) = first {
                sample.record(*asic, queue, Pass::First, *v);
            }
            if let Some(v) = second {
                sample.record(*asic, queue, Pass::Second, *v);
            }
        }
        sample
    }

    #[test]
    fn test_decrease_is_loss() {
        let result = diff(&sample(&[(1, "XMT1-d", Some("0x0000001a"), Some("0x00000010"))]));
        assert_eq!(
            result.entries,
            vec![QueueDiff {
                asic_id: 1,
                queue: "XMT1-d".into(),
                delta: 10,
                loss_detected: true,
            }]
        );
    }

    #[test]
    fn test_equal_or_increase_is_not_loss() {
        let result = diff(&sample(&[
            (0, "CPU1-d", Some("0x00000005"), Some("0x00000005")),
            (0, "RSM1-d", Some("0x00000005"), Some("0x00000009")),
        ]));
        assert_eq!(result.len(), 2);
        assert_eq!(result.losses().count(), 0);
        assert_eq!(result.entries[1].delta, -4);
    }

    #[test]
    fn test_missing_pass_is_excluded() {
        let result = diff(&sample(&[
            (0, "CPU1-d", Some("0x00000005"), None),
            (0, "RSM1-d", None, Some("0x00000005")),
            (0, "L2Q-d", Some("0x00000002"), Some("0x00000001")),
        ]));
        assert_eq!(result.len(), 1);
        assert_eq!(result.entries[0].queue, "L2Q-d");
    }

    #[test]
    fn test_zero_is_a_value() {
        let result = diff(&sample(&[(0, "CPU1-d", Some("0x00000000"), Some("0x00000000"))]));
        assert_eq!(result.len(), 1);
        assert!(!result.entries[0].loss_detected);
    }

    #[test]
    fn test_increase_direction() {
        let sample = sample(&[
            (2, "SLU-d", Some("0x00000001"), Some("0x00000004")),
            (2, "SLI-d", Some("0x00000004"), Some("0x00000001")),
        ]);
        let result = diff_with(&sample, LossDirection::Increase);
        let losses: Vec<_> = result.losses().map(|d| (d.queue.as_str(), d.delta)).collect();
        assert_eq!(losses, vec![("SLU-d", 3)]);
    }

    #[test]
    fn test_full_width_counters() {
        let result = diff(&sample(&[(0, "CPU3-d", Some("0xFFFFFFFF"), Some("0x00000000"))]));
        assert_eq!(result.entries[0].delta, 4_294_967_295);
    }

    #[test]
    fn test_report_lines() {
        let result = diff(&sample(&[
            (3, "XMT2-d", Some("0x00000003"), Some("0x00000001")),
            (3, "XMT3-d", Some("0x00000001"), Some("0x00000001")),
        ]));
        assert_eq!(
            result.report_lines("fw-edge-1"),
            vec![
                "Packet loss of 2 packet(s) detected in ASIC 3 within queue XMT2-d on host fw-edge-1"
                    .to_string(),
                "No packet loss detected in ASIC 3 within queue XMT3-d on host fw-edge-1".to_string(),
            ]
        );
    }
}
