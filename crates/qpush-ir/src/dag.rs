//! DAG-based circuit representation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex as PetNodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{Instruction, InstructionKind};
use crate::qubit::{ClbitId, QubitId};

/// Node index type for the circuit DAG. Indices stay valid across removals.
pub type NodeIndex = PetNodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DagNode {
    /// Input node for a wire.
    In(WireId),
    /// Output node for a wire.
    Out(WireId),
    /// Operation node containing an instruction.
    Op(Instruction),
}

impl DagNode {
    #[inline]
    pub fn is_op(&self) -> bool {
        matches!(self, DagNode::Op(_))
    }

    #[inline]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }
}

/// Identifier for a wire in the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireId {
    Qubit(QubitId),
    Clbit(ClbitId),
}

impl From<QubitId> for WireId {
    fn from(q: QubitId) -> Self {
        WireId::Qubit(q)
    }
}

impl From<ClbitId> for WireId {
    fn from(c: ClbitId) -> Self {
        WireId::Clbit(c)
    }
}

/// An edge in the circuit DAG, carrying the wire it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagEdge {
    pub wire: WireId,
}

/// The abstraction level of a circuit in the compilation pipeline.
///
/// Circuits start `Logical` and become `Physical` once a layout pass has
/// mapped them onto device qubits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitLevel {
    #[default]
    Logical,
    Physical,
}

/// DAG-based circuit representation.
///
/// Every wire runs from its `In` node through the operations that touch it
/// to its `Out` node. Operation order on a wire is the edge order; ops on
/// disjoint wires are unordered.
///
/// `wire_front` maps each wire to the node just before its output, so
/// appending an instruction is O(1) per operand.
#[derive(Debug, Clone)]
pub struct CircuitDag {
    graph: StableDiGraph<DagNode, DagEdge, u32>,
    qubit_inputs: FxHashMap<QubitId, NodeIndex>,
    qubit_outputs: FxHashMap<QubitId, NodeIndex>,
    clbit_inputs: FxHashMap<ClbitId, NodeIndex>,
    clbit_outputs: FxHashMap<ClbitId, NodeIndex>,
    wire_front: FxHashMap<WireId, NodeIndex>,
    global_phase: f64,
    level: CircuitLevel,
}

impl CircuitDag {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::default(),
            qubit_inputs: FxHashMap::default(),
            qubit_outputs: FxHashMap::default(),
            clbit_inputs: FxHashMap::default(),
            clbit_outputs: FxHashMap::default(),
            wire_front: FxHashMap::default(),
            global_phase: 0.0,
            level: CircuitLevel::Logical,
        }
    }

    /// A DAG with the same wires, level and phase but no operations.
    ///
    /// Rewriting passes fill this while walking the original in order.
    pub fn empty_like(&self) -> Self {
        let mut dag = Self::new();
        for q in self.qubits() {
            dag.add_qubit(q);
        }
        for c in self.clbits() {
            dag.add_clbit(c);
        }
        dag.global_phase = self.global_phase;
        dag.level = self.level;
        dag
    }

    /// Add a qubit wire. Adding an existing qubit is a no-op.
    pub fn add_qubit(&mut self, qubit: QubitId) {
        if self.qubit_inputs.contains_key(&qubit) {
            return;
        }
        let (in_node, out_node) = self.add_wire(WireId::Qubit(qubit));
        self.qubit_inputs.insert(qubit, in_node);
        self.qubit_outputs.insert(qubit, out_node);
    }

    /// Add a classical wire. Adding an existing clbit is a no-op.
    pub fn add_clbit(&mut self, clbit: ClbitId) {
        if self.clbit_inputs.contains_key(&clbit) {
            return;
        }
        let (in_node, out_node) = self.add_wire(WireId::Clbit(clbit));
        self.clbit_inputs.insert(clbit, in_node);
        self.clbit_outputs.insert(clbit, out_node);
    }

    fn add_wire(&mut self, wire: WireId) -> (NodeIndex, NodeIndex) {
        let in_node = self.graph.add_node(DagNode::In(wire));
        let out_node = self.graph.add_node(DagNode::Out(wire));
        self.graph.add_edge(in_node, out_node, DagEdge { wire });
        self.wire_front.insert(wire, in_node);
        (in_node, out_node)
    }

    /// Append an instruction at the end of its wires.
    ///
    /// Fails if the gate arity does not match, an operand is unknown, or a
    /// qubit appears twice.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        let gate_name = match &instruction.kind {
            InstructionKind::Gate(gate) => Some(gate.name().to_string()),
            _ => None,
        };

        if let InstructionKind::Gate(gate) = &instruction.kind {
            let expected = gate.num_qubits() as usize;
            let got = instruction.qubits.len();
            if expected != got {
                return Err(IrError::QubitCountMismatch {
                    gate_name: gate.name().to_string(),
                    expected: expected as u32,
                    got: got as u32,
                });
            }
        }
        if instruction.is_measure() && instruction.qubits.len() != instruction.clbits.len() {
            return Err(IrError::MeasureArity {
                qubits: instruction.qubits.len(),
                clbits: instruction.clbits.len(),
            });
        }

        for &qubit in &instruction.qubits {
            if !self.qubit_inputs.contains_key(&qubit) {
                return Err(IrError::QubitNotFound {
                    qubit,
                    gate_name: gate_name.clone(),
                });
            }
        }
        for &clbit in &instruction.clbits {
            if !self.clbit_inputs.contains_key(&clbit) {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    gate_name: gate_name.clone(),
                });
            }
        }

        let mut seen = FxHashSet::default();
        for &qubit in &instruction.qubits {
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit { qubit, gate_name });
            }
        }

        let wires: Vec<(WireId, NodeIndex)> = instruction
            .qubits
            .iter()
            .map(|q| (WireId::Qubit(*q), self.qubit_outputs[q]))
            .chain(
                instruction
                    .clbits
                    .iter()
                    .map(|c| (WireId::Clbit(*c), self.clbit_outputs[c])),
            )
            .collect();

        let op_node = self.graph.add_node(DagNode::Op(instruction));

        for (wire, out_node) in wires {
            let prev_node = self.wire_front[&wire];
            let edge = self
                .graph
                .edges_directed(prev_node, Direction::Outgoing)
                .find(|e| e.weight().wire == wire && e.target() == out_node)
                .map(|e| e.id())
                .ok_or_else(|| {
                    IrError::InvalidDag(format!("wire {wire:?} is not connected to its output"))
                })?;
            self.graph.remove_edge(edge);
            self.graph.add_edge(prev_node, op_node, DagEdge { wire });
            self.graph.add_edge(op_node, out_node, DagEdge { wire });
            self.wire_front.insert(wire, op_node);
        }

        Ok(op_node)
    }

    /// Node order in which every node follows its predecessors.
    ///
    /// Ties are broken by insertion order, so a circuit built gate by gate
    /// iterates back in the order it was written.
    fn topological_order(&self) -> Vec<NodeIndex> {
        let mut indegree: FxHashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.edges_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| Reverse(*n))
            .collect();

        let mut order = Vec::with_capacity(indegree.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if let Some(d) = indegree.get_mut(&edge.target()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse(edge.target()));
                    }
                }
            }
        }
        order
    }

    /// Iterate over operations in topological order.
    pub fn topological_ops(&self) -> impl Iterator<Item = (NodeIndex, &Instruction)> {
        self.topological_order()
            .into_iter()
            .filter_map(|idx| self.graph[idx].instruction().map(|inst| (idx, inst)))
    }

    #[inline]
    pub fn get_instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        self.graph.node_weight(node).and_then(DagNode::instruction)
    }

    /// The operation that follows `node` on `wire`, or `None` at the output.
    pub fn next_on_wire(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.target())
            .filter(|n| self.graph[*n].is_op())
    }

    /// Operations on `wire` from input to output. Empty for an unknown wire.
    pub fn wire_ops(&self, wire: WireId) -> Vec<NodeIndex> {
        let start = match wire {
            WireId::Qubit(q) => self.qubit_inputs.get(&q),
            WireId::Clbit(c) => self.clbit_inputs.get(&c),
        };
        let Some(&start) = start else {
            return vec![];
        };

        let mut ops = Vec::new();
        let mut current = start;
        while let Some(next) = self.next_on_wire(current, wire) {
            ops.push(next);
            current = next;
        }
        ops
    }

    /// Remove an operation and splice its wires back together.
    pub fn remove_op(&mut self, node: NodeIndex) -> IrResult<Instruction> {
        if !self.graph.node_weight(node).is_some_and(DagNode::is_op) {
            return Err(IrError::InvalidNode);
        }

        let incoming: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| (e.source(), e.weight().wire))
            .collect();
        let outgoing: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), e.weight().wire))
            .collect();

        for (pred, wire) in &incoming {
            if self.wire_front.get(wire) == Some(&node) {
                self.wire_front.insert(*wire, *pred);
            }
            for (succ, succ_wire) in &outgoing {
                if wire == succ_wire {
                    self.graph.add_edge(*pred, *succ, DagEdge { wire: *wire });
                }
            }
        }

        match self.graph.remove_node(node) {
            Some(DagNode::Op(instruction)) => Ok(instruction),
            _ => Err(IrError::InvalidNode),
        }
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.qubit_inputs.len()
    }

    #[inline]
    pub fn num_clbits(&self) -> usize {
        self.clbit_inputs.len()
    }

    /// Number of operation nodes.
    #[inline]
    pub fn num_ops(&self) -> usize {
        let io_nodes = 2 * (self.qubit_inputs.len() + self.clbit_inputs.len());
        self.graph.node_count().saturating_sub(io_nodes)
    }

    /// Length of the longest operation chain.
    pub fn depth(&self) -> usize {
        let mut depths: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut max_depth = 0usize;

        for node in self.topological_order() {
            let max_pred_depth = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| depths.get(&e.source()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let node_depth = max_pred_depth + usize::from(self.graph[node].is_op());
            max_depth = max_depth.max(node_depth);
            depths.insert(node, node_depth);
        }

        max_depth
    }

    /// Qubits in ascending order.
    pub fn qubits(&self) -> impl Iterator<Item = QubitId> + '_ {
        let mut qubits: Vec<_> = self.qubit_inputs.keys().copied().collect();
        qubits.sort_unstable();
        qubits.into_iter()
    }

    /// Classical bits in ascending order.
    pub fn clbits(&self) -> impl Iterator<Item = ClbitId> + '_ {
        let mut clbits: Vec<_> = self.clbit_inputs.keys().copied().collect();
        clbits.sort_unstable();
        clbits.into_iter()
    }

    pub fn global_phase(&self) -> f64 {
        self.global_phase
    }

    pub fn set_global_phase(&mut self, phase: f64) {
        self.global_phase = phase;
    }

    pub fn level(&self) -> CircuitLevel {
        self.level
    }

    pub fn set_level(&mut self, level: CircuitLevel) {
        self.level = level;
    }

    pub fn graph(&self) -> &StableDiGraph<DagNode, DagEdge, u32> {
        &self.graph
    }

    /// Check that the graph is acyclic and every wire runs unbroken from its
    /// input to its output.
    pub fn verify_integrity(&self) -> IrResult<()> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(IrError::InvalidDag("graph contains a cycle".into()));
        }

        let qubit_wires = self.qubit_inputs.iter().map(|(q, n)| {
            (WireId::Qubit(*q), *n, self.qubit_outputs.get(q).copied())
        });
        let clbit_wires = self.clbit_inputs.iter().map(|(c, n)| {
            (WireId::Clbit(*c), *n, self.clbit_outputs.get(c).copied())
        });

        for (wire, in_node, out_node) in qubit_wires.chain(clbit_wires) {
            let out_node = out_node
                .ok_or_else(|| IrError::InvalidDag(format!("{wire:?} has no output node")))?;

            let mut current = in_node;
            let mut steps = 0;
            while current != out_node {
                current = self
                    .graph
                    .edges_directed(current, Direction::Outgoing)
                    .find(|e| e.weight().wire == wire)
                    .map(|e| e.target())
                    .ok_or_else(|| {
                        IrError::InvalidDag(format!("{wire:?} is broken after node {current:?}"))
                    })?;
                steps += 1;
                if steps > self.graph.node_count() {
                    return Err(IrError::InvalidDag(format!("{wire:?} does not terminate")));
                }
            }
        }

        if self.topological_order().len() != self.graph.node_count() {
            return Err(IrError::InvalidDag("unreachable node in DAG".into()));
        }

        Ok(())
    }
}

impl Default for CircuitDag {
    fn default() -> Self {
        Self::new()
    }
}
