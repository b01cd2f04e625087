//! Basis translation for IBM targets.
//!
//! Single-qubit gates become `rz`/`sx`/`x`. The entangler depends on the
//! processor family: `ecr` (Eagle), `cz` (Heron) or plain `cx`. All
//! identities hold up to global phase and are listed in time order.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use tracing::debug;

use qpush_ir::{CircuitDag, GateKind, Instruction, InstructionKind, ParameterExpression, QubitId, StandardGate};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{BasisGates, PropertySet};
use crate::unitary::{Unitary2x2, ZsxStep};

/// Native two-qubit gate of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entangler {
    Ecr,
    Cz,
    Cx,
}

impl Entangler {
    /// Pick the entangler from a basis, preferring `ecr`, then `cz`, then `cx`.
    pub fn detect(basis: &BasisGates) -> Option<Self> {
        if basis.contains("ecr") {
            Some(Self::Ecr)
        } else if basis.contains("cz") {
            Some(Self::Cz)
        } else if basis.contains("cx") {
            Some(Self::Cx)
        } else {
            None
        }
    }
}

/// Rewrites every gate into the target basis.
pub struct BasisTranslation;

struct Translator<'a> {
    basis: &'a BasisGates,
    entangler: Option<Entangler>,
    out: Vec<Instruction>,
}

fn bound(gate: &StandardGate, param: &ParameterExpression) -> CompileResult<f64> {
    param.as_f64().ok_or_else(|| CompileError::UnboundParameter {
        gate: gate.name().to_string(),
        symbol: param.first_symbol().unwrap_or_default().to_string(),
    })
}

impl Translator<'_> {
    fn rz(&mut self, theta: f64, q: QubitId) {
        self.out.push(Instruction::single_qubit_gate(
            StandardGate::Rz(ParameterExpression::constant(theta)),
            q,
        ));
    }

    fn sx(&mut self, q: QubitId) {
        self.out.push(Instruction::single_qubit_gate(StandardGate::SX, q));
    }

    fn x(&mut self, q: QubitId) {
        if self.basis.contains("x") {
            self.out.push(Instruction::single_qubit_gate(StandardGate::X, q));
        } else {
            self.sx(q);
            self.sx(q);
        }
    }

    fn h(&mut self, q: QubitId) {
        self.rz(FRAC_PI_2, q);
        self.sx(q);
        self.rz(FRAC_PI_2, q);
    }

    /// Emit a matrix as its `rz`/`sx`/`x` sequence.
    fn unitary(&mut self, m: &Unitary2x2, q: QubitId) {
        for step in m.zsx_sequence() {
            match step {
                ZsxStep::Rz(theta) => self.rz(theta, q),
                ZsxStep::Sx => self.sx(q),
                ZsxStep::X => self.x(q),
            }
        }
    }

    fn one_qubit(&mut self, gate: &StandardGate, q: QubitId) -> CompileResult<()> {
        if matches!(gate, StandardGate::I) {
            return Ok(());
        }
        for param in gate.parameters() {
            bound(gate, param)?;
        }
        if self.basis.contains(gate.name()) {
            self.out.push(Instruction::single_qubit_gate(gate.clone(), q));
            return Ok(());
        }

        match gate {
            StandardGate::H => self.h(q),
            StandardGate::X => self.x(q),
            StandardGate::Y => {
                self.rz(PI, q);
                self.x(q);
            }
            StandardGate::Z => self.rz(PI, q),
            StandardGate::S => self.rz(FRAC_PI_2, q),
            StandardGate::Sdg => self.rz(-FRAC_PI_2, q),
            StandardGate::T => self.rz(FRAC_PI_4, q),
            StandardGate::Tdg => self.rz(-FRAC_PI_4, q),
            StandardGate::SXdg => {
                self.rz(PI, q);
                self.sx(q);
                self.rz(PI, q);
            }
            StandardGate::P(theta) | StandardGate::Rz(theta) => {
                let theta = bound(gate, theta)?;
                self.rz(theta, q);
            }
            other => {
                let m = Unitary2x2::from_gate(other)
                    .ok_or_else(|| CompileError::GateNotInBasis(other.name().to_string()))?;
                self.unitary(&m, q);
            }
        }
        Ok(())
    }

    fn cx(&mut self, c: QubitId, t: QubitId) -> CompileResult<()> {
        match self.entangler {
            Some(Entangler::Cx) => {
                self.out.push(Instruction::two_qubit_gate(StandardGate::CX, c, t));
            }
            Some(Entangler::Ecr) => {
                self.x(c);
                self.sx(t);
                self.out
                    .push(Instruction::two_qubit_gate(StandardGate::ECR, c, t));
                self.rz(FRAC_PI_2, c);
            }
            Some(Entangler::Cz) => {
                self.h(t);
                self.out.push(Instruction::two_qubit_gate(StandardGate::CZ, c, t));
                self.h(t);
            }
            None => return Err(CompileError::GateNotInBasis("cx".into())),
        }
        Ok(())
    }

    fn two_qubit(&mut self, gate: &StandardGate, a: QubitId, b: QubitId) -> CompileResult<()> {
        match (gate, self.entangler) {
            (StandardGate::CX, _) => self.cx(a, b),
            (StandardGate::CZ, Some(Entangler::Cz)) | (StandardGate::ECR, Some(Entangler::Ecr)) => {
                self.out.push(Instruction::two_qubit_gate(gate.clone(), a, b));
                Ok(())
            }
            (StandardGate::CZ, _) => {
                self.h(b);
                self.cx(a, b)?;
                self.h(b);
                Ok(())
            }
            (StandardGate::Swap, _) => {
                self.cx(a, b)?;
                self.cx(b, a)?;
                self.cx(a, b)
            }
            _ => Err(CompileError::GateNotInBasis(gate.name().to_string())),
        }
    }

    fn instruction(&mut self, inst: &Instruction) -> CompileResult<()> {
        let InstructionKind::Gate(gate) = &inst.kind else {
            self.out.push(inst.clone());
            return Ok(());
        };

        match &gate.kind {
            GateKind::Standard(std) if inst.qubits.len() == 1 => self.one_qubit(std, inst.qubits[0]),
            GateKind::Standard(std) => self.two_qubit(std, inst.qubits[0], inst.qubits[1]),
            GateKind::Custom(custom) if self.basis.contains(&custom.name) => {
                self.out.push(inst.clone());
                Ok(())
            }
            GateKind::Custom(custom) => Err(CompileError::GateNotInBasis(custom.name.clone())),
        }
    }
}

impl Pass for BasisTranslation {
    fn name(&self) -> &'static str {
        "BasisTranslation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let basis = properties
            .basis_gates
            .as_ref()
            .ok_or(CompileError::MissingBasisGates)?;

        let mut translator = Translator {
            basis,
            entangler: Entangler::detect(basis),
            out: Vec::new(),
        };
        debug!("Translating to {:?} entangler", translator.entangler);

        for (_, inst) in dag.topological_ops() {
            translator.instruction(inst)?;
        }

        let mut out = dag.empty_like();
        for inst in translator.out {
            out.apply(inst)?;
        }
        *dag = out;
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.basis_gates.is_some()
    }
}
