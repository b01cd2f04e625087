//! High-level circuit builder API.

use std::collections::BTreeMap;

use crate::dag::CircuitDag;
use crate::error::IrResult;
use crate::gate::{Gate, StandardGate};
use crate::instruction::Instruction;
use crate::parameter::ParameterExpression;
use crate::qubit::{Clbit, ClbitId, Qubit, QubitId};

/// Name of the classical register created by [`Circuit::measure_all`].
pub const MEASURE_ALL_REGISTER: &str = "meas";

/// A quantum circuit.
///
/// Gate methods append to the underlying [`CircuitDag`] and return
/// `&mut Self`, so a circuit reads top to bottom:
///
/// ```rust
/// use qpush_ir::{Circuit, QubitId};
///
/// let mut circuit = Circuit::with_qreg("bell", 2);
/// circuit.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?.measure_all()?;
/// assert_eq!(circuit.num_clbits(), 2);
/// # Ok::<(), qpush_ir::IrError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Circuit {
    name: String,
    qubits: Vec<Qubit>,
    clbits: Vec<Clbit>,
    dag: CircuitDag,
}

impl Circuit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qubits: vec![],
            clbits: vec![],
            dag: CircuitDag::new(),
        }
    }

    /// A circuit with one quantum register `q` of `num_qubits` and no
    /// classical bits.
    pub fn with_qreg(name: impl Into<String>, num_qubits: u32) -> Self {
        let mut circuit = Self::new(name);
        circuit.add_qreg("q", num_qubits);
        circuit
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_qubit_id(&self) -> QubitId {
        QubitId(self.qubits.len() as u32)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_clbit_id(&self) -> ClbitId {
        ClbitId(self.clbits.len() as u32)
    }

    /// Add a quantum register with `size` qubits.
    pub fn add_qreg(&mut self, name: impl Into<String>, size: u32) -> Vec<QubitId> {
        let name = name.into();
        (0..size)
            .map(|i| {
                let id = self.next_qubit_id();
                self.qubits.push(Qubit::with_register(id, &name, i));
                self.dag.add_qubit(id);
                id
            })
            .collect()
    }

    /// Add a classical register with `size` bits.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> Vec<ClbitId> {
        let name = name.into();
        (0..size)
            .map(|i| {
                let id = self.next_clbit_id();
                self.clbits.push(Clbit::with_register(id, &name, i));
                self.dag.add_clbit(id);
                id
            })
            .collect()
    }

    fn apply_1q(&mut self, gate: StandardGate, qubit: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::single_qubit_gate(gate, qubit))?;
        Ok(self)
    }

    fn apply_2q(&mut self, gate: StandardGate, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::two_qubit_gate(gate, q1, q2))?;
        Ok(self)
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::H, qubit)
    }

    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::X, qubit)
    }

    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Y, qubit)
    }

    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Z, qubit)
    }

    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::S, qubit)
    }

    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Sdg, qubit)
    }

    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::T, qubit)
    }

    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Tdg, qubit)
    }

    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::SX, qubit)
    }

    pub fn sxdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::SXdg, qubit)
    }

    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Rx(theta.into()), qubit)
    }

    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Ry(theta.into()), qubit)
    }

    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::Rz(theta.into()), qubit)
    }

    pub fn p(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_1q(StandardGate::P(theta.into()), qubit)
    }

    /// Universal gate U(θ, φ, λ) = Rz(φ) · Ry(θ) · Rz(λ).
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_1q(
            StandardGate::U(theta.into(), phi.into(), lambda.into()),
            qubit,
        )
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_2q(StandardGate::CX, control, target)
    }

    pub fn cz(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_2q(StandardGate::CZ, q1, q2)
    }

    pub fn ecr(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_2q(StandardGate::ECR, q1, q2)
    }

    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_2q(StandardGate::Swap, q1, q2)
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Apply any gate, standard or custom.
    pub fn gate(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::gate(gate, qubits))?;
        Ok(self)
    }

    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::measure(qubit, clbit))?;
        Ok(self)
    }

    /// Measure every qubit into a fresh register.
    ///
    /// Adds a barrier across all qubits, then a new classical register
    /// [`MEASURE_ALL_REGISTER`] with one bit per qubit, and measures qubit i
    /// into bit i of that register. Existing classical bits are untouched.
    #[allow(clippy::cast_possible_truncation)]
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        let qubits: Vec<_> = self.qubits.iter().map(|q| q.id).collect();
        if qubits.is_empty() {
            return Ok(self);
        }
        self.dag.apply(Instruction::barrier(qubits.iter().copied()))?;
        let clbits = self.add_creg(MEASURE_ALL_REGISTER, qubits.len() as u32);
        self.dag.apply(Instruction::measure_many(qubits, clbits)?)?;
        Ok(self)
    }

    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::reset(qubit))?;
        Ok(self)
    }

    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::barrier(qubits))?;
        Ok(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    pub fn num_clbits(&self) -> usize {
        self.clbits.len()
    }

    pub fn depth(&self) -> usize {
        self.dag.depth()
    }

    pub fn dag(&self) -> &CircuitDag {
        &self.dag
    }

    pub fn into_dag(self) -> CircuitDag {
        self.dag
    }

    pub fn qubits(&self) -> &[Qubit] {
        &self.qubits
    }

    pub fn clbits(&self) -> &[Clbit] {
        &self.clbits
    }

    /// Operation counts by name, e.g. `{"cx": 1, "h": 1, "measure": 1}`.
    ///
    /// A multi-qubit measurement counts once per measured qubit.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, inst) in self.dag.topological_ops() {
            let n = if inst.is_measure() { inst.qubits.len() } else { 1 };
            *counts.entry(inst.name().to_string()).or_insert(0) += n;
        }
        counts
    }

    /// A circuit over `dag` that keeps this circuit's name and classical
    /// bits. Qubits are taken from the DAG and placed in register `q`.
    ///
    /// Compilation uses this to hand back a physical circuit whose
    /// measurements still land in the original classical registers.
    #[must_use]
    pub fn with_dag(&self, dag: CircuitDag) -> Self {
        let qubits = dag
            .qubits()
            .map(|id| Qubit::with_register(id, "q", id.0))
            .collect();
        Self {
            name: self.name.clone(),
            qubits,
            clbits: self.clbits.clone(),
            dag,
        }
    }

    /// Two-qubit Bell circuit: H on q0, CX q0 → q1, then `measure_all`.
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::with_qreg("bell", 2);
        let (q0, q1) = (QubitId(0), QubitId(1));
        circuit.h(q0)?.cx(q0, q1)?.measure_all()?;
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::CustomGate;
    use crate::instruction::InstructionKind;

    #[test]
    fn test_bell_shape() {
        let circuit = Circuit::bell().unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.num_clbits(), 2);
        assert!(
            circuit
                .clbits()
                .iter()
                .all(|c| c.register.as_deref() == Some(MEASURE_ALL_REGISTER))
        );

        let ops = circuit.count_ops();
        assert_eq!(ops.get("h"), Some(&1));
        assert_eq!(ops.get("cx"), Some(&1));
        assert_eq!(ops.get("barrier"), Some(&1));
        assert_eq!(ops.get("measure"), Some(&2));
        // H, CX, barrier, measure
        assert_eq!(circuit.depth(), 4);
    }

    #[test]
    fn test_bell_instruction_order() {
        let circuit = Circuit::bell().unwrap();
        let ops: Vec<_> = circuit.dag().topological_ops().map(|(_, i)| i.clone()).collect();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0].standard_gate(), Some(&StandardGate::H));
        assert_eq!(ops[1].standard_gate(), Some(&StandardGate::CX));
        assert_eq!(ops[1].qubits, vec![QubitId(0), QubitId(1)]);
        assert!(ops[2].is_barrier());
        assert!(matches!(ops[3].kind, InstructionKind::Measure));
        assert_eq!(ops[3].qubits, vec![QubitId(0), QubitId(1)]);
        assert_eq!(ops[3].clbits, vec![ClbitId(0), ClbitId(1)]);
    }

    #[test]
    fn test_measure_all_appends_after_existing_clbits() {
        let mut circuit = Circuit::with_qreg("c", 1);
        circuit.add_creg("c", 2);
        circuit.x(QubitId(0)).unwrap().measure_all().unwrap();
        assert_eq!(circuit.num_clbits(), 3);
        assert_eq!(circuit.clbits()[2].register.as_deref(), Some("meas"));
        assert_eq!(circuit.clbits()[2].id, ClbitId(2));
    }

    #[test]
    fn test_fluent_api_rejects_unknown_qubit() {
        let mut circuit = Circuit::with_qreg("bad", 1);
        assert!(circuit.cx(QubitId(0), QubitId(1)).is_err());
        assert!(circuit.gate(CustomGate::new("oracle", 1), [QubitId(0)]).is_ok());
    }

    #[test]
    fn test_with_dag_keeps_classical_bits() {
        let circuit = Circuit::bell().unwrap();
        let mut dag = CircuitDag::new();
        for q in 0..5 {
            dag.add_qubit(QubitId(q));
        }
        for c in circuit.dag().clbits() {
            dag.add_clbit(c);
        }
        let wide = circuit.with_dag(dag);
        assert_eq!(wide.num_qubits(), 5);
        assert_eq!(wide.num_clbits(), 2);
        assert_eq!(wide.name(), "bell");
        assert_eq!(wide.qubits()[4].to_string(), "q[4]");
    }
}
