//! Simulator backend implementation.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};
use uuid::Uuid;

use qpush_hal::{
    Backend, BackendAvailability, Capabilities, HalError, HalResult, JobId, JobStatus, SessionId,
    SessionOptions, ValidationResult,
};
use qpush_ir::{Circuit, ClbitId, InstructionKind, QubitId};

use crate::error::{SimError, SimResult};
use crate::statevector::Statevector;

/// Most qubits a circuit may actually touch.
pub const DEFAULT_MAX_ACTIVE_QUBITS: usize = 24;

/// Outcome of one simulated job.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    /// Exact probability of each classical bitstring.
    pub probabilities: BTreeMap<String, f64>,
    /// Sampled counts; they sum to `shots`.
    pub counts: BTreeMap<String, u32>,
    pub shots: u32,
}

impl SampleResult {
    pub fn probability(&self, bitstring: &str) -> f64 {
        self.probabilities.get(bitstring).copied().unwrap_or(0.0)
    }

    pub fn count(&self, bitstring: &str) -> u32 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }
}

/// Local statevector backend.
///
/// A transpiled circuit spans the whole device, but only the qubits it
/// touches are simulated, so a Bell pair placed on a 127-qubit layout
/// costs four amplitudes. Only terminal measurements are supported.
///
/// Bitstrings put the highest classical bit first.
pub struct SimulatorBackend {
    capabilities: Capabilities,
    max_active_qubits: usize,
    seed: Option<u64>,
    sessions: Mutex<FxHashSet<String>>,
    jobs: Mutex<FxHashMap<String, SampleResult>>,
}

impl SimulatorBackend {
    /// A fully connected simulator with `num_qubits` qubits.
    pub fn new(num_qubits: u32) -> Self {
        Self::with_capabilities(Capabilities::simulator(num_qubits))
    }

    /// Pose as a device: the backend reports `capabilities` and validates
    /// circuits against them.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            max_active_qubits: DEFAULT_MAX_ACTIVE_QUBITS,
            seed: None,
            sessions: Mutex::new(FxHashSet::default()),
            jobs: Mutex::new(FxHashMap::default()),
        }
    }

    /// Make shot sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_active_qubits(mut self, max: usize) -> Self {
        self.max_active_qubits = max;
        self
    }

    /// Exact outcome distribution of `circuit`.
    #[instrument(skip(self, circuit), fields(circuit = circuit.name()))]
    pub fn probabilities(&self, circuit: &Circuit) -> SimResult<BTreeMap<String, f64>> {
        let dag = circuit.dag();

        let mut active: Vec<QubitId> = dag
            .topological_ops()
            .filter(|(_, inst)| !inst.is_barrier())
            .flat_map(|(_, inst)| inst.qubits.iter().copied())
            .collect();
        active.sort_unstable();
        active.dedup();
        if active.len() > self.max_active_qubits {
            return Err(SimError::TooManyQubits {
                required: active.len(),
                max: self.max_active_qubits,
            });
        }
        let local: FxHashMap<QubitId, usize> =
            active.iter().enumerate().map(|(i, q)| (*q, i)).collect();
        debug!(
            "Simulating {} active of {} qubits",
            active.len(),
            circuit.num_qubits()
        );

        let mut sv = Statevector::new(active.len());
        let mut touched = FxHashSet::default();
        let mut measured = FxHashSet::default();
        let mut writes: Vec<(usize, ClbitId)> = Vec::new();

        for (_, inst) in dag.topological_ops() {
            if inst.is_barrier() {
                continue;
            }
            let qubits: Vec<usize> = inst.qubits.iter().map(|q| local[q]).collect();
            if let Some(i) = qubits.iter().position(|q| measured.contains(q)) {
                return Err(SimError::MidCircuitMeasurement {
                    qubit: inst.qubits[i].0,
                });
            }
            match &inst.kind {
                InstructionKind::Gate(_) => {
                    let gate = inst
                        .standard_gate()
                        .ok_or_else(|| SimError::UnsupportedGate(inst.name().to_string()))?;
                    sv.apply(gate, &qubits)?;
                    touched.extend(qubits);
                }
                InstructionKind::Measure => {
                    measured.extend(qubits.iter().copied());
                    writes.extend(qubits.into_iter().zip(inst.clbits.iter().copied()));
                }
                InstructionKind::Reset => {
                    // Untouched qubits are already |0⟩.
                    if let Some(i) = qubits.iter().position(|q| touched.contains(q)) {
                        return Err(SimError::UnsupportedReset {
                            qubit: inst.qubits[i].0,
                        });
                    }
                }
                InstructionKind::Barrier => {}
            }
        }

        let clbits: Vec<ClbitId> = dag.clbits().collect();
        let position: FxHashMap<ClbitId, usize> = clbits
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, clbits.len() - 1 - i))
            .collect();

        let mut distribution = BTreeMap::new();
        for (index, p) in sv.probabilities() {
            if p < 1e-12 {
                continue;
            }
            let mut bits = vec![b'0'; clbits.len()];
            for (q, c) in &writes {
                if index & (1 << q) != 0 {
                    bits[position[c]] = b'1';
                }
            }
            let key = String::from_utf8_lossy(&bits).into_owned();
            *distribution.entry(key).or_insert(0.0) += p;
        }
        Ok(distribution)
    }

    /// Simulate `circuit` and draw `shots` samples.
    pub fn run(&self, circuit: &Circuit, shots: u32) -> SimResult<SampleResult> {
        let probabilities = self.probabilities(circuit)?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut counts = BTreeMap::new();
        for _ in 0..shots {
            let r: f64 = rng.r#gen();
            let mut cumulative = 0.0;
            let mut outcome = None;
            for (bits, p) in &probabilities {
                cumulative += p;
                outcome = Some(bits);
                if r < cumulative {
                    break;
                }
            }
            if let Some(bits) = outcome {
                *counts.entry(bits.clone()).or_insert(0) += 1;
            }
        }

        Ok(SampleResult {
            probabilities,
            counts,
            shots,
        })
    }

    /// Result of a submitted job.
    pub fn result(&self, job_id: &JobId) -> HalResult<SampleResult> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id.0)
            .cloned()
            .ok_or_else(|| HalError::JobNotFound(job_id.0.clone()))
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Backend for SimulatorBackend {
    fn name(&self) -> &str {
        &self.capabilities.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn availability(&self) -> HalResult<BackendAvailability> {
        Ok(BackendAvailability::always_available())
    }

    async fn validate(&self, circuit: &Circuit) -> HalResult<ValidationResult> {
        Ok(ValidationResult::check(&self.capabilities, circuit))
    }

    async fn open_session(&self, _options: &SessionOptions) -> HalResult<SessionId> {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        Ok(SessionId(id))
    }

    async fn close_session(&self, session: &SessionId) -> HalResult<()> {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session.0);
        if removed {
            Ok(())
        } else {
            Err(HalError::Session(format!("unknown session {session}")))
        }
    }

    #[instrument(skip(self, circuit))]
    async fn submit(
        &self,
        circuit: &Circuit,
        shots: u32,
        session: Option<&SessionId>,
    ) -> HalResult<JobId> {
        if let Some(session) = session {
            let open = self
                .sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&session.0);
            if !open {
                return Err(HalError::Session(format!("session {session} is not open")));
            }
        }

        let result = self.run(circuit, shots)?;
        let job_id = JobId::new(Uuid::new_v4().to_string());
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.0.clone(), result);
        debug!("Completed job {job_id}");
        Ok(job_id)
    }

    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        self.result(job_id).map(|_| JobStatus::Completed)
    }

    async fn cancel(&self, job_id: &JobId) -> HalResult<()> {
        // Jobs finish inside submit(); there is nothing left to stop.
        self.result(job_id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_probabilities() {
        let backend = SimulatorBackend::new(2);
        let p = backend.probabilities(&Circuit::bell().unwrap()).unwrap();
        assert_eq!(p.len(), 2);
        assert!((p["00"] - 0.5).abs() < 1e-9);
        assert!((p["11"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let backend = SimulatorBackend::new(2).with_seed(7);
        let a = backend.run(&Circuit::bell().unwrap(), 4096).unwrap();
        let b = backend.run(&Circuit::bell().unwrap(), 4096).unwrap();
        assert_eq!(a.counts, b.counts);
        assert_eq!(a.count("00") + a.count("11"), 4096);
        assert!(a.count("00").abs_diff(2048) < 200);
    }

    #[test]
    fn test_clbit_order_highest_first() {
        let mut circuit = Circuit::with_qreg("x1", 2);
        circuit.x(QubitId(1)).unwrap().measure_all().unwrap();
        let p = SimulatorBackend::new(2).probabilities(&circuit).unwrap();
        assert_eq!(p.keys().collect::<Vec<_>>(), ["10"]);
    }

    #[test]
    fn test_idle_qubits_are_not_simulated() {
        let mut circuit = Circuit::with_qreg("wide", 127);
        circuit
            .h(QubitId(60))
            .unwrap()
            .cx(QubitId(60), QubitId(61))
            .unwrap();
        circuit.add_creg("c", 2);
        circuit
            .measure(QubitId(60), ClbitId(0))
            .unwrap()
            .measure(QubitId(61), ClbitId(1))
            .unwrap();
        let backend = SimulatorBackend::new(127).with_max_active_qubits(4);
        let p = backend.probabilities(&circuit).unwrap();
        assert!((p["11"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_too_many_active_qubits() {
        let mut circuit = Circuit::with_qreg("busy", 3);
        for q in 0..3 {
            circuit.h(QubitId(q)).unwrap();
        }
        let backend = SimulatorBackend::new(3).with_max_active_qubits(2);
        let err = backend.probabilities(&circuit).unwrap_err();
        assert!(matches!(err, SimError::TooManyQubits { required: 3, max: 2 }));
    }

    #[test]
    fn test_gate_after_measure_rejected() {
        let mut circuit = Circuit::with_qreg("mid", 1);
        circuit.add_creg("c", 1);
        circuit
            .measure(QubitId(0), ClbitId(0))
            .unwrap()
            .x(QubitId(0))
            .unwrap();
        let err = SimulatorBackend::new(1).probabilities(&circuit).unwrap_err();
        assert!(matches!(err, SimError::MidCircuitMeasurement { qubit: 0 }));
    }

    #[tokio::test]
    async fn test_submit_requires_open_session() {
        let backend = SimulatorBackend::new(2);
        let err = backend
            .submit(&Circuit::bell().unwrap(), 10, Some(&SessionId::new("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::Session(_)));

        let session = backend.open_session(&SessionOptions::default()).await.unwrap();
        let job = backend
            .submit(&Circuit::bell().unwrap(), 10, Some(&session))
            .await
            .unwrap();
        assert_eq!(backend.status(&job).await.unwrap(), JobStatus::Completed);
        backend.close_session(&session).await.unwrap();
        assert_eq!(backend.open_sessions(), 0);
    }
}
