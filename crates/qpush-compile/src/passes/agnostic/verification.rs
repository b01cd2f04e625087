//! Verification passes for ensuring compilation correctness.
//!
//! [`MeasurementSnapshot`] records what the input circuit measures before
//! anything is rewritten; [`MeasurementBarrierVerification`] runs last and
//! checks that no pass lost a measurement, retargeted one, or pushed a gate
//! behind a terminal measurement.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use qpush_ir::{CircuitDag, ClbitId, WireId};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Measurement facts about a circuit, keyed by classical bit so they
/// survive qubit remapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementProfile {
    /// How many measurements write each classical bit.
    pub writes: FxHashMap<ClbitId, usize>,
    /// Bits whose measured qubit sees another gate afterwards.
    pub mid_circuit: FxHashSet<ClbitId>,
}

impl MeasurementProfile {
    pub fn of(dag: &CircuitDag) -> Self {
        let mut profile = Self::default();
        for (node, inst) in dag.topological_ops() {
            if !inst.is_measure() {
                continue;
            }
            for (q, c) in inst.qubits.iter().zip(&inst.clbits) {
                *profile.writes.entry(*c).or_default() += 1;
                if first_gate_after(dag, node, WireId::Qubit(*q)).is_some() {
                    profile.mid_circuit.insert(*c);
                }
            }
        }
        profile
    }
}

/// Name of the first gate that follows `node` on `wire`, if any.
///
/// A reset clears the qubit, so nothing after it counts.
fn first_gate_after(
    dag: &CircuitDag,
    node: qpush_ir::NodeIndex,
    wire: WireId,
) -> Option<String> {
    let mut current = node;
    while let Some(next) = dag.next_on_wire(current, wire) {
        let inst = dag.get_instruction(next)?;
        if inst.is_reset() {
            return None;
        }
        if inst.is_gate() {
            return Some(inst.name().to_string());
        }
        current = next;
    }
    None
}

/// Analysis pass that stores the input circuit's [`MeasurementProfile`].
pub struct MeasurementSnapshot;

impl Pass for MeasurementSnapshot {
    fn name(&self) -> &'static str {
        "MeasurementSnapshot"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        properties.insert(MeasurementProfile::of(dag));
        Ok(())
    }
}

/// Result of measurement barrier verification.
#[derive(Debug, Clone, Default)]
pub struct VerificationResult {
    pub passed: bool,
    pub qubits_checked: usize,
    pub measurements_found: usize,
}

/// Final safety net over the compiled DAG.
///
/// Checks that the DAG is structurally sound, that every classical bit is
/// written as often as in the snapshot, and that no terminal measurement
/// has picked up a trailing gate. Without a snapshot only the structural
/// check runs.
pub struct MeasurementBarrierVerification;

impl Pass for MeasurementBarrierVerification {
    fn name(&self) -> &'static str {
        "MeasurementBarrierVerification"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        dag.verify_integrity()?;

        let after = MeasurementProfile::of(dag);
        let measurements_found = after.writes.values().sum();

        if let Some(before) = properties.get::<MeasurementProfile>() {
            let mut clbits: Vec<_> = before.writes.keys().chain(after.writes.keys()).collect();
            clbits.sort_unstable();
            clbits.dedup();

            for clbit in clbits {
                let expected = before.writes.get(clbit).copied().unwrap_or(0);
                let found = after.writes.get(clbit).copied().unwrap_or(0);
                if expected != found {
                    return Err(CompileError::MeasurementViolation {
                        gate_name: "measure".into(),
                        qubit: u32::MAX,
                        detail: format!(
                            "{clbit} was measured {expected} time(s), now {found}"
                        ),
                    });
                }
            }

            for (node, inst) in dag.topological_ops() {
                if !inst.is_measure() {
                    continue;
                }
                for (q, c) in inst.qubits.iter().zip(&inst.clbits) {
                    if before.mid_circuit.contains(c) {
                        continue;
                    }
                    if let Some(gate) = first_gate_after(dag, node, WireId::Qubit(*q)) {
                        return Err(CompileError::MeasurementViolation {
                            gate_name: gate,
                            qubit: q.0,
                            detail: format!("gate now follows the terminal measurement into {c}"),
                        });
                    }
                }
            }
        }

        let result = VerificationResult {
            passed: true,
            qubits_checked: dag.num_qubits(),
            measurements_found,
        };
        debug!(
            "Measurement verification passed: {} qubits, {} measurements",
            result.qubits_checked, result.measurements_found
        );
        properties.insert(result);
        Ok(())
    }
}
