//! Static ASIC/QMU topology tables for supported NetScreen products.

/// ASIC and QMU ids exposed by one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    /// ASIC ids in query order.
    pub asic_ids: &'static [u32],

    /// QMU ids in query order; each must have an entry in the queue table.
    pub qmu_ids: &'static [u32],
}

/// How the packet-count command addresses an ASIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterCommand {
    /// ISG platforms have a single ASIC, so the id is omitted.
    SingleAsic,
    /// NetScreen-5400 with second-generation management modules.
    Ns5400II,
    /// NetScreen-5400 with third-generation management modules.
    Ns5400III,
}

impl CounterCommand {
    /// Render the command for one (ASIC, QMU) pair.
    pub fn render(self, asic: u32, qmu: u32) -> String {
        match self {
            CounterCommand::SingleAsic => format!("get asic engine qmu pktcnt {}", qmu),
            CounterCommand::Ns5400II | CounterCommand::Ns5400III => {
                format!("get asic {} engine qmu pktcnt {}", asic, qmu)
            }
        }
    }
}

const NS5400: Topology = Topology {
    asic_ids: &[1, 2, 3, 4, 5, 6],
    qmu_ids: &[1, 2, 4, 6, 7, 9],
};

const ISG: Topology = Topology {
    asic_ids: &[0],
    qmu_ids: &[1, 2, 4, 6, 7, 9],
};

/// Product name as reported by `get system` -> topology.
pub(crate) static TOPOLOGIES: &[(&str, Topology)] = &[
    ("NetScreen-5400-II", NS5400),
    ("NetScreen-5400-III", NS5400),
    ("NetScreen-1000", ISG),
    ("NetScreen-2000", ISG),
];

/// Product name -> counter command family. Keep in step with `TOPOLOGIES`.
pub(crate) static COUNTER_COMMANDS: &[(&str, CounterCommand)] = &[
    ("NetScreen-5400-II", CounterCommand::Ns5400II),
    ("NetScreen-5400-III", CounterCommand::Ns5400III),
    ("NetScreen-1000", CounterCommand::SingleAsic),
    ("NetScreen-2000", CounterCommand::SingleAsic),
];

/// QMU id -> queue names it reports counters for.
pub(crate) static QMU_QUEUES: &[(u32, &[&str])] = &[
    (1, &["CPU2-d"]),
    (2, &["CPU1-d", "RSM1-d"]),
    (4, &["L2Q-d"]),
    (6, &["SLU-d", "SLI-d"]),
    (
        7,
        &[
            "XMT1-d", "XMT2-d", "XMT3-d", "XMT4-d", "XMT5-d", "XMT6-d", "XMT7-d", "XMT8-d",
        ],
    ),
    (9, &["RSM2-d", "CPU3-d", "CPU4-d", "CPU5-d"]),
];

/// Queue names for a QMU, or `None` if the queue table has no entry.
pub fn queues_for(qmu: u32) -> Option<&'static [&'static str]> {
    QMU_QUEUES
        .iter()
        .find(|(id, _)| *id == qmu)
        .map(|(_, queues)| *queues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_qmu_has_queues() {
        for (product, topology) in TOPOLOGIES {
            for qmu in topology.qmu_ids {
                assert!(
                    queues_for(*qmu).is_some_and(|q| !q.is_empty()),
                    "{product}: QMU {qmu} has no queue entry"
                );
            }
        }
    }

    #[test]
    fn test_every_product_has_counter_command() {
        for (product, _) in TOPOLOGIES {
            assert!(
                COUNTER_COMMANDS.iter().any(|(p, _)| p == product),
                "{product} has no counter command"
            );
        }
        assert_eq!(TOPOLOGIES.len(), COUNTER_COMMANDS.len());
    }

    #[test]
    fn test_render() {
        assert_eq!(
            CounterCommand::SingleAsic.render(0, 7),
            "get asic engine qmu pktcnt 7"
        );
        assert_eq!(
            CounterCommand::Ns5400III.render(3, 9),
            "get asic 3 engine qmu pktcnt 9"
        );
    }

    #[test]
    fn test_queues_for() {
        assert_eq!(queues_for(2), Some(&["CPU1-d", "RSM1-d"][..]));
        assert_eq!(queues_for(3), None);
    }
}
