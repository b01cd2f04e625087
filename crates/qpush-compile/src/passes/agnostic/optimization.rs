//! Peephole optimizations: single-qubit fusion and two-qubit pair cancellation.

use std::collections::BTreeMap;

use tracing::debug;

use qpush_ir::{CircuitDag, Instruction, ParameterExpression, QubitId, StandardGate, WireId};

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;
use crate::unitary::{Unitary2x2, ZsxStep};

/// Target form for fused single-qubit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneQubitBasis {
    /// `rz`, `sx`, `x` (IBM).
    Zsx,
    /// A single `U(θ, φ, λ)`.
    U,
}

/// Fuses runs of adjacent single-qubit gates.
///
/// Each maximal run on a wire is multiplied into one matrix and
/// resynthesized in the target form. The run is replaced only when the new
/// sequence is strictly shorter; a run equal to the identity disappears.
pub struct Optimize1qGates {
    basis: Option<OneQubitBasis>,
}

impl Optimize1qGates {
    /// Pick the basis from the `PropertySet` at run time.
    pub fn new() -> Self {
        Self { basis: None }
    }

    pub fn with_basis(basis: OneQubitBasis) -> Self {
        Self { basis: Some(basis) }
    }

    fn resolve_basis(&self, properties: &PropertySet) -> Option<OneQubitBasis> {
        if self.basis.is_some() {
            return self.basis;
        }
        match &properties.basis_gates {
            None => Some(OneQubitBasis::U),
            Some(b) if b.contains("rz") && b.contains("sx") => Some(OneQubitBasis::Zsx),
            Some(b) if b.contains("u") => Some(OneQubitBasis::U),
            Some(_) => None,
        }
    }

    fn synthesize(basis: OneQubitBasis, m: &Unitary2x2, q: QubitId) -> Vec<Instruction> {
        if m.is_identity() {
            return vec![];
        }
        match basis {
            OneQubitBasis::Zsx => m
                .zsx_sequence()
                .into_iter()
                .map(|step| {
                    let gate = match step {
                        ZsxStep::Rz(theta) => StandardGate::Rz(ParameterExpression::constant(theta)),
                        ZsxStep::Sx => StandardGate::SX,
                        ZsxStep::X => StandardGate::X,
                    };
                    Instruction::single_qubit_gate(gate, q)
                })
                .collect(),
            OneQubitBasis::U => {
                let (theta, phi, lambda) = m.to_u_params();
                vec![Instruction::single_qubit_gate(
                    StandardGate::U(
                        ParameterExpression::constant(theta),
                        ParameterExpression::constant(phi),
                        ParameterExpression::constant(lambda),
                    ),
                    q,
                )]
            }
        }
    }

    fn flush(
        basis: OneQubitBasis,
        q: QubitId,
        run: Vec<(Instruction, Unitary2x2)>,
        out: &mut CircuitDag,
    ) -> CompileResult<()> {
        if run.is_empty() {
            return Ok(());
        }
        let product = run
            .iter()
            .fold(Unitary2x2::identity(), |acc, (_, m)| m.mul(&acc));
        let replacement = Self::synthesize(basis, &product, q);

        if replacement.len() < run.len() {
            debug!(
                "Fused {} gates on {q} into {}",
                run.len(),
                replacement.len()
            );
            for inst in replacement {
                out.apply(inst)?;
            }
        } else {
            for (inst, _) in run {
                out.apply(inst)?;
            }
        }
        Ok(())
    }
}

impl Default for Optimize1qGates {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for Optimize1qGates {
    fn name(&self) -> &'static str {
        "Optimize1qGates"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let Some(basis) = self.resolve_basis(properties) else {
            debug!("No single-qubit basis to fuse into, skipping");
            return Ok(());
        };

        let mut out = dag.empty_like();
        let mut runs: BTreeMap<QubitId, Vec<(Instruction, Unitary2x2)>> = BTreeMap::new();

        for (_, inst) in dag.topological_ops() {
            let fusable = match inst.standard_gate() {
                Some(gate) if inst.qubits.len() == 1 => Unitary2x2::from_gate(gate),
                _ => None,
            };
            if let Some(m) = fusable {
                runs.entry(inst.qubits[0]).or_default().push((inst.clone(), m));
                continue;
            }

            for q in &inst.qubits {
                if let Some(run) = runs.remove(q) {
                    Self::flush(basis, *q, run, &mut out)?;
                }
            }
            out.apply(inst.clone())?;
        }

        for (q, run) in runs {
            Self::flush(basis, q, run, &mut out)?;
        }

        *dag = out;
        Ok(())
    }
}

/// Removes back-to-back pairs of self-inverse two-qubit gates.
///
/// `CX` and `ECR` cancel only with the same control and target; `CZ` and
/// `SWAP` cancel in either operand order. Repeats until nothing changes, so
/// nested pairs like `CX CX CX CX` vanish completely.
pub struct CancelTwoQubitPairs;

impl CancelTwoQubitPairs {
    fn cancels(first: &Instruction, second: &Instruction) -> bool {
        let (Some(a), Some(b)) = (first.standard_gate(), second.standard_gate()) else {
            return false;
        };
        if a != b {
            return false;
        }
        match a {
            StandardGate::CX | StandardGate::ECR => first.qubits == second.qubits,
            StandardGate::CZ | StandardGate::Swap => {
                first.qubits == second.qubits
                    || (first.qubits[0] == second.qubits[1] && first.qubits[1] == second.qubits[0])
            }
            _ => false,
        }
    }
}

impl Pass for CancelTwoQubitPairs {
    fn name(&self) -> &'static str {
        "CancelTwoQubitPairs"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        let mut removed = 0usize;

        loop {
            let mut pair = None;
            for (node, inst) in dag.topological_ops() {
                if inst.qubits.len() != 2 || !inst.is_gate() {
                    continue;
                }
                let next0 = dag.next_on_wire(node, WireId::Qubit(inst.qubits[0]));
                let next1 = dag.next_on_wire(node, WireId::Qubit(inst.qubits[1]));
                let Some(next) = next0.filter(|n| Some(*n) == next1) else {
                    continue;
                };
                if dag
                    .get_instruction(next)
                    .is_some_and(|other| Self::cancels(inst, other))
                {
                    pair = Some((node, next));
                    break;
                }
            }

            let Some((first, second)) = pair else {
                break;
            };
            dag.remove_op(second)?;
            dag.remove_op(first)?;
            removed += 2;
        }

        if removed > 0 {
            debug!("Cancelled {removed} two-qubit gates");
        }
        Ok(())
    }
}
