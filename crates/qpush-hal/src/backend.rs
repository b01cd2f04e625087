//! Backend trait.
//!
//! ```text
//!   capabilities() ──→ validate() ──→ open_session() ──→ submit() ──→ close_session()
//!    (sync, &ref)       (async)        (async)           (async)       (async)
//! ```
//!
//! | Method | Kind | Returns |
//! |--------|------|---------|
//! | `name()` | sync | `&str` |
//! | `capabilities()` | sync | `&Capabilities` |
//! | `availability()` | async | `HalResult<BackendAvailability>` |
//! | `validate()` | async | `HalResult<ValidationResult>` |
//! | `open_session()` | async | `HalResult<SessionId>` |
//! | `close_session()` | async | `HalResult<()>` |
//! | `submit()` | async | `HalResult<JobId>` |
//! | `status()` | async | `HalResult<JobStatus>` |
//! | `cancel()` | async | `HalResult<()>` |

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use qpush_ir::Circuit;

use crate::capability::Capabilities;
use crate::error::HalResult;
use crate::job::{JobId, JobStatus, SessionId, SessionOptions};

/// Trait for quantum backends.
///
/// `capabilities()` is synchronous and infallible: implementations fetch
/// them once while connecting and hand out a reference afterwards.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the capabilities of this backend.
    fn capabilities(&self) -> &Capabilities;

    /// Check whether the backend accepts work right now.
    async fn availability(&self) -> HalResult<BackendAvailability>;

    /// Validate a circuit against backend constraints.
    async fn validate(&self, circuit: &Circuit) -> HalResult<ValidationResult>;

    /// Open an execution session.
    async fn open_session(&self, options: &SessionOptions) -> HalResult<SessionId>;

    /// Release a session. Jobs already submitted keep running.
    async fn close_session(&self, session: &SessionId) -> HalResult<()>;

    /// Submit a circuit for sampling, optionally inside a session.
    ///
    /// Returns as soon as the backend has accepted the job.
    async fn submit(
        &self,
        circuit: &Circuit,
        shots: u32,
        session: Option<&SessionId>,
    ) -> HalResult<JobId>;

    /// Get the status of a job.
    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus>;

    /// Cancel a queued or running job.
    async fn cancel(&self, job_id: &JobId) -> HalResult<()>;
}

/// Backend availability information.
#[derive(Debug, Clone)]
pub struct BackendAvailability {
    /// Whether the backend is currently accepting jobs.
    pub is_available: bool,
    /// Number of jobs currently in queue (if known).
    pub queue_depth: Option<u32>,
    /// Estimated wait time for a new job (if known).
    pub estimated_wait: Option<Duration>,
    /// Human-readable status message.
    pub status_message: Option<String>,
}

impl BackendAvailability {
    /// Zero queue, zero wait. Typical for simulators.
    pub fn always_available() -> Self {
        Self {
            is_available: true,
            queue_depth: Some(0),
            estimated_wait: Some(Duration::ZERO),
            status_message: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            is_available: false,
            queue_depth: None,
            estimated_wait: None,
            status_message: Some(reason.into()),
        }
    }
}

/// Result of circuit validation against backend constraints.
///
/// `RequiresTranspilation` means the circuit fits the device but uses
/// gates or couplings it does not execute natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { reasons: Vec<String> },
    RequiresTranspilation { details: String },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Check a circuit against qubit count, gate set and directed topology.
    ///
    /// Measurements, resets and barriers are accepted on any qubit.
    pub fn check(capabilities: &Capabilities, circuit: &Circuit) -> Self {
        if circuit.num_qubits() > capabilities.num_qubits as usize {
            return ValidationResult::Invalid {
                reasons: vec![format!(
                    "circuit uses {} qubits, {} has {}",
                    circuit.num_qubits(),
                    capabilities.name,
                    capabilities.num_qubits
                )],
            };
        }

        let mut out_of_range = BTreeSet::new();
        let mut foreign_gates = BTreeSet::new();
        let mut foreign_pairs = BTreeSet::new();

        for (_, inst) in circuit.dag().topological_ops() {
            for q in &inst.qubits {
                if q.0 >= capabilities.num_qubits {
                    out_of_range.insert(q.0);
                }
            }
            if !inst.is_gate() {
                continue;
            }
            if !capabilities.gate_set.contains(inst.name()) {
                foreign_gates.insert(inst.name().to_string());
            }
            if let [a, b] = inst.qubits[..] {
                if !capabilities.topology.supports(a.0, b.0) {
                    foreign_pairs.insert((a.0, b.0));
                }
            }
        }

        if !out_of_range.is_empty() {
            return ValidationResult::Invalid {
                reasons: out_of_range
                    .into_iter()
                    .map(|q| format!("qubit {q} does not exist on {}", capabilities.name))
                    .collect(),
            };
        }

        let mut details = Vec::new();
        if !foreign_gates.is_empty() {
            let gates: Vec<_> = foreign_gates.into_iter().collect();
            details.push(format!("non-native gates: {}", gates.join(", ")));
        }
        if !foreign_pairs.is_empty() {
            let pairs: Vec<_> = foreign_pairs
                .into_iter()
                .map(|(a, b)| format!("({a}, {b})"))
                .collect();
            details.push(format!("uncoupled pairs: {}", pairs.join(", ")));
        }

        if details.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::RequiresTranspilation {
                details: details.join("; "),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{GateSet, Topology};
    use qpush_ir::QubitId;

    fn eagle_pair() -> Capabilities {
        Capabilities::ibm(
            "eagle-pair",
            2,
            GateSet::ibm_eagle(),
            Topology::directed(vec![(0, 1)]),
        )
    }

    #[test]
    fn test_backend_availability_always_available() {
        let avail = BackendAvailability::always_available();
        assert!(avail.is_available);
        assert_eq!(avail.queue_depth, Some(0));
        assert!(avail.status_message.is_none());
    }

    #[test]
    fn test_backend_availability_unavailable() {
        let avail = BackendAvailability::unavailable("maintenance");
        assert!(!avail.is_available);
        assert_eq!(avail.status_message.as_deref(), Some("maintenance"));
    }

    #[test]
    fn test_logical_bell_requires_transpilation() {
        let result = ValidationResult::check(&eagle_pair(), &Circuit::bell().unwrap());
        match result {
            ValidationResult::RequiresTranspilation { details } => {
                assert!(details.contains("cx"));
                assert!(details.contains('h'));
            }
            other => panic!("expected RequiresTranspilation, got {other:?}"),
        }
    }

    #[test]
    fn test_native_circuit_is_valid() {
        let mut circuit = Circuit::with_qreg("native", 2);
        circuit
            .sx(QubitId(1))
            .unwrap()
            .ecr(QubitId(0), QubitId(1))
            .unwrap()
            .measure_all()
            .unwrap();
        assert!(ValidationResult::check(&eagle_pair(), &circuit).is_valid());
    }

    #[test]
    fn test_reversed_pair_requires_transpilation() {
        let mut circuit = Circuit::with_qreg("reversed", 2);
        circuit.ecr(QubitId(1), QubitId(0)).unwrap();
        let result = ValidationResult::check(&eagle_pair(), &circuit);
        assert_eq!(
            result,
            ValidationResult::RequiresTranspilation {
                details: "uncoupled pairs: (1, 0)".into()
            }
        );
    }

    #[test]
    fn test_too_wide_is_invalid() {
        let circuit = Circuit::with_qreg("wide", 3);
        assert!(matches!(
            ValidationResult::check(&eagle_pair(), &circuit),
            ValidationResult::Invalid { .. }
        ));
    }
}
