//! Routing: rewrite the circuit onto physical qubits, inserting SWAPs.

use tracing::{debug, info};

use qpush_ir::{CircuitDag, CircuitLevel, Instruction, QubitId, StandardGate};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{Layout, PropertySet};

/// Number of SWAPs the last routing run inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingStats {
    pub swaps_inserted: usize,
}

/// Shortest-path SWAP routing.
///
/// Walks the circuit in order and, whenever a two-qubit gate lands on
/// physical qubits that share no edge, moves the first operand along a
/// shortest path until it sits next to the second. The layout in the
/// `PropertySet` tracks every SWAP.
///
/// The output DAG has one wire per device qubit (`q0..q{n-1}`), keeps the
/// original classical wires and is marked [`CircuitLevel::Physical`].
pub struct ShortestPathRouting;

impl ShortestPathRouting {
    fn physical(layout: &Layout, logical: QubitId) -> CompileResult<u32> {
        layout.get_physical(logical).ok_or(CompileError::MissingLayout)
    }
}

impl Pass for ShortestPathRouting {
    fn name(&self) -> &'static str {
        "ShortestPathRouting"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .as_ref()
            .ok_or(CompileError::MissingCouplingMap)?;
        let layout = properties
            .layout
            .as_mut()
            .ok_or(CompileError::MissingLayout)?;

        let mut routed = CircuitDag::new();
        for p in 0..coupling_map.num_qubits() {
            routed.add_qubit(QubitId(p));
        }
        for c in dag.clbits() {
            routed.add_clbit(c);
        }
        routed.set_global_phase(dag.global_phase());
        routed.set_level(CircuitLevel::Physical);

        let mut swaps = 0usize;

        for (_, inst) in dag.topological_ops() {
            let is_two_qubit_gate = inst.is_gate() && inst.qubits.len() == 2;

            if inst.is_gate() && inst.qubits.len() > 2 {
                return Err(CompileError::PassFailed {
                    name: self.name().into(),
                    reason: format!(
                        "gate '{}' acts on {} qubits; only one- and two-qubit gates can be routed",
                        inst.name(),
                        inst.qubits.len()
                    ),
                });
            }

            if is_two_qubit_gate {
                let mut p0 = Self::physical(layout, inst.qubits[0])?;
                let p1 = Self::physical(layout, inst.qubits[1])?;

                if !coupling_map.is_connected(p0, p1) {
                    let path = coupling_map.shortest_path(p0, p1).ok_or(
                        CompileError::RoutingFailed {
                            qubit1: p0,
                            qubit2: p1,
                        },
                    )?;
                    debug!("Routing {} on ({p0}, {p1}) via {path:?}", inst.name());

                    for hop in path.windows(2).take(path.len().saturating_sub(2)) {
                        routed.apply(Instruction::two_qubit_gate(
                            StandardGate::Swap,
                            QubitId(hop[0]),
                            QubitId(hop[1]),
                        ))?;
                        layout.swap(hop[0], hop[1]);
                        swaps += 1;
                    }
                    p0 = path[path.len() - 2];
                }

                routed.apply(Instruction {
                    kind: inst.kind.clone(),
                    qubits: vec![QubitId(p0), QubitId(p1)],
                    clbits: inst.clbits.clone(),
                })?;
                continue;
            }

            let mut missing = None;
            let mapped = inst.remap_qubits(|q| match layout.get_physical(q) {
                Some(p) => QubitId(p),
                None => {
                    missing = Some(q);
                    q
                }
            });
            if missing.is_some() {
                return Err(CompileError::MissingLayout);
            }
            routed.apply(mapped)?;
        }

        info!("Routing inserted {swaps} SWAP gates");
        *dag = routed;
        properties.insert(RoutingStats {
            swaps_inserted: swaps,
        });
        Ok(())
    }
}
