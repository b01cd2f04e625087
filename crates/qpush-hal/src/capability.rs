//! Backend capability introspection.
//!
//! [`Capabilities`] is what a backend reports about itself: qubit count,
//! the gates it executes, and which directed qubit pairs can host a
//! two-qubit gate. The CLI turns these into a compiler target.
//!
//! IBM couplings are directed: an ECR on `(0, 1)` does not imply one on
//! `(1, 0)`. [`Topology`] therefore keeps edges as given and only the
//! constructors for symmetric devices add both directions.

use serde::{Deserialize, Serialize};

/// Hardware capabilities of a quantum backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the backend.
    pub name: String,
    /// Number of qubits available.
    pub num_qubits: u32,
    /// Supported gate set (OpenQASM 3 naming convention).
    pub gate_set: GateSet,
    /// Directed qubit connectivity.
    pub topology: Topology,
    /// Maximum number of shots per job.
    pub max_shots: u32,
    /// Whether this is a simulator (`true`) or real hardware (`false`).
    pub is_simulator: bool,
    /// Additional capability flags such as `"statevector"` or `"sessions"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Capabilities {
    /// Create capabilities for a simulator.
    pub fn simulator(num_qubits: u32) -> Self {
        Self {
            name: "simulator".into(),
            num_qubits,
            gate_set: GateSet::universal(),
            topology: Topology::full(num_qubits),
            max_shots: 100_000,
            is_simulator: true,
            features: vec!["statevector".into(), "sessions".into()],
        }
    }

    /// Create capabilities for an IBM device from its reported
    /// configuration.
    pub fn ibm(name: impl Into<String>, num_qubits: u32, gate_set: GateSet, topology: Topology) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            gate_set,
            topology,
            max_shots: 100_000,
            is_simulator: false,
            features: vec!["sessions".into()],
        }
    }

    pub fn with_max_shots(mut self, max_shots: u32) -> Self {
        self.max_shots = max_shots;
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Gate names that act on two qubits.
const TWO_QUBIT_GATES: &[&str] = &["cx", "cz", "ecr", "swap", "rzz", "cy", "ch", "crz"];

/// Gate set supported by a backend.
///
/// Gate names follow the OpenQASM 3 naming convention (lowercase).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSet {
    /// Single-qubit gates supported.
    pub single_qubit: Vec<String>,
    /// Two-qubit gates supported.
    pub two_qubit: Vec<String>,
}

impl GateSet {
    /// Split a flat basis list, as IBM reports it, by arity.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for name in names {
            let name = name.into();
            if TWO_QUBIT_GATES.contains(&name.as_str()) {
                set.two_qubit.push(name);
            } else {
                set.single_qubit.push(name);
            }
        }
        set
    }

    /// IBM Eagle (127-qubit processors such as `ibm_brisbane`): `ecr, id, rz, sx, x`.
    pub fn ibm_eagle() -> Self {
        Self::from_names(["ecr", "id", "rz", "sx", "x"])
    }

    /// IBM Heron (156-qubit processors): `cz, id, rz, sx, x`.
    pub fn ibm_heron() -> Self {
        Self::from_names(["cz", "id", "rz", "sx", "x"])
    }

    /// Every gate the qpush IR knows.
    pub fn universal() -> Self {
        Self::from_names([
            "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz", "p",
            "u", "cx", "cz", "ecr", "swap",
        ])
    }

    /// Check if a gate is supported.
    pub fn contains(&self, gate: &str) -> bool {
        self.single_qubit.iter().any(|g| g == gate) || self.two_qubit.iter().any(|g| g == gate)
    }

    /// All gate names, single-qubit first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.single_qubit
            .iter()
            .chain(&self.two_qubit)
            .map(String::as_str)
    }
}

/// Qubit connectivity topology.
///
/// An edge `(a, b)` allows a two-qubit gate with `a` first and `b` second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Kind of topology.
    pub kind: TopologyKind,
    /// Directed coupling edges.
    pub edges: Vec<(u32, u32)>,
}

impl Topology {
    /// A chain with both directions on every link.
    pub fn linear(n: u32) -> Self {
        let edges = (0..n.saturating_sub(1))
            .flat_map(|i| [(i, i + 1), (i + 1, i)])
            .collect();
        Self {
            kind: TopologyKind::Linear,
            edges,
        }
    }

    /// Every ordered pair of distinct qubits.
    pub fn full(n: u32) -> Self {
        let mut edges = vec![];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    edges.push((i, j));
                }
            }
        }
        Self {
            kind: TopologyKind::FullyConnected,
            edges,
        }
    }

    /// Edges exactly as a device reports them.
    pub fn directed(edges: Vec<(u32, u32)>) -> Self {
        Self {
            kind: TopologyKind::Custom,
            edges,
        }
    }

    /// Whether a two-qubit gate may run with `first` as its first operand.
    pub fn supports(&self, first: u32, second: u32) -> bool {
        self.edges.contains(&(first, second))
    }

    /// Whether two qubits are coupled in either direction.
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.supports(q1, q2) || self.supports(q2, q1)
    }
}

/// Kind of qubit topology.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopologyKind {
    FullyConnected,
    Linear,
    /// Heavy-hex lattice (IBM Eagle/Heron processors).
    HeavyHex,
    Custom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_set_split_by_arity() {
        let set = GateSet::ibm_eagle();
        assert_eq!(set.two_qubit, vec!["ecr".to_string()]);
        assert_eq!(set.single_qubit.len(), 4);
        assert!(set.contains("sx"));
        assert!(!set.contains("cx"));
        assert_eq!(set.names().count(), 5);
    }

    #[test]
    fn test_directed_topology() {
        let topo = Topology::directed(vec![(0, 1), (2, 1)]);
        assert!(topo.supports(0, 1));
        assert!(!topo.supports(1, 0));
        assert!(topo.is_connected(1, 2));
        assert!(!topo.is_connected(0, 2));
    }

    #[test]
    fn test_linear_is_bidirectional() {
        let topo = Topology::linear(3);
        assert_eq!(topo.edges.len(), 4);
        assert!(topo.supports(1, 0));
        assert!(topo.supports(1, 2));
    }

    #[test]
    fn test_simulator_capabilities() {
        let caps = Capabilities::simulator(4);
        assert!(caps.is_simulator);
        assert!(caps.has_feature("statevector"));
        assert_eq!(caps.topology.edges.len(), 12);
        assert!(caps.gate_set.contains("ecr"));
    }
}
