//! Gate direction: make every two-qubit gate follow a native coupling edge.

use std::f64::consts::FRAC_PI_2;

use qpush_ir::{CircuitDag, Instruction, ParameterExpression, QubitId, StandardGate};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{CouplingMap, PropertySet};

/// Flips two-qubit gates whose `(first, second)` qubit order is not a
/// native edge but whose reverse is.
///
/// - `CX(a,b) = H a, H b, CX(b,a), H a, H b`
/// - `ECR(a,b) = Ry(-π/2) a, Ry(π/2) b, ECR(b,a), H a, H b`
/// - `CZ` is symmetric, so only the operands swap.
/// - `SWAP` becomes three CX along the native direction.
///
/// Runs after routing, so every gate already sits on a coupled pair.
pub struct GateDirection;

fn h(q: QubitId) -> Instruction {
    Instruction::single_qubit_gate(StandardGate::H, q)
}

fn ry(angle: f64, q: QubitId) -> Instruction {
    Instruction::single_qubit_gate(StandardGate::Ry(ParameterExpression::constant(angle)), q)
}

fn cx(c: QubitId, t: QubitId) -> Instruction {
    Instruction::two_qubit_gate(StandardGate::CX, c, t)
}

/// Replacement for a gate on `(a, b)` when only `(b, a)` is native.
fn reversed(gate: &StandardGate, a: QubitId, b: QubitId) -> Option<Vec<Instruction>> {
    let seq = match gate {
        StandardGate::CX => vec![h(a), h(b), cx(b, a), h(a), h(b)],
        StandardGate::ECR => vec![
            ry(-FRAC_PI_2, a),
            ry(FRAC_PI_2, b),
            Instruction::two_qubit_gate(StandardGate::ECR, b, a),
            h(a),
            h(b),
        ],
        StandardGate::CZ => vec![Instruction::two_qubit_gate(StandardGate::CZ, b, a)],
        _ => return None,
    };
    Some(seq)
}

/// SWAP as three CX with the middle one reversed onto `(c, t)`.
fn swap_along(c: QubitId, t: QubitId) -> Vec<Instruction> {
    vec![cx(c, t), h(c), h(t), cx(c, t), h(c), h(t), cx(c, t)]
}

impl GateDirection {
    fn rewrite(
        coupling_map: &CouplingMap,
        inst: &Instruction,
    ) -> CompileResult<Option<Vec<Instruction>>> {
        let Some(gate) = inst.standard_gate() else {
            return Ok(None);
        };
        if inst.qubits.len() != 2 {
            return Ok(None);
        }
        let (a, b) = (inst.qubits[0], inst.qubits[1]);
        let forward = coupling_map.supports(a.0, b.0);
        let backward = coupling_map.supports(b.0, a.0);

        if !forward && !backward {
            return Err(CompileError::UnsupportedCoupling {
                qubit1: a.0,
                qubit2: b.0,
            });
        }

        if matches!(gate, StandardGate::Swap) {
            let (c, t) = if forward { (a, b) } else { (b, a) };
            return Ok(Some(swap_along(c, t)));
        }
        if forward {
            return Ok(None);
        }
        Ok(reversed(gate, a, b))
    }
}

impl Pass for GateDirection {
    fn name(&self) -> &'static str {
        "GateDirection"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .as_ref()
            .ok_or(CompileError::MissingCouplingMap)?;

        let mut out = dag.empty_like();
        for (_, inst) in dag.topological_ops() {
            match Self::rewrite(coupling_map, inst)? {
                Some(seq) => {
                    for replacement in seq {
                        out.apply(replacement)?;
                    }
                }
                None => {
                    out.apply(inst.clone())?;
                }
            }
        }
        *dag = out;
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.coupling_map.is_some()
    }
}
