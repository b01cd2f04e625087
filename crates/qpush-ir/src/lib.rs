//! Circuit intermediate representation for qpush.
//!
//! Circuits are stored as a DAG of instructions over qubit and classical
//! wires. The [`Circuit`] builder is what callers use; compiler passes work
//! on the [`CircuitDag`] directly.
//!
//! # Example: the Bell circuit
//!
//! ```rust
//! use qpush_ir::Circuit;
//!
//! let circuit = Circuit::bell()?;
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.count_ops()["measure"], 2);
//! # Ok::<(), qpush_ir::IrError>(())
//! ```
//!
//! # Supported Gates
//!
//! | Gate | Qubits | Description |
//! |------|--------|-------------|
//! | `H` | 1 | Hadamard gate |
//! | `X`, `Y`, `Z` | 1 | Pauli gates |
//! | `S`, `Sdg`, `T`, `Tdg` | 1 | Phase gates |
//! | `SX`, `SXdg` | 1 | Square root of X |
//! | `Rx`, `Ry`, `Rz`, `P` | 1 | Rotation gates |
//! | `U` | 1 | Universal single-qubit gate U(θ,φ,λ) |
//! | `CX`, `CZ` | 2 | Controlled-X and controlled-Z |
//! | `ECR` | 2 | Echoed cross-resonance |
//! | `Swap` | 2 | SWAP gate |

pub mod circuit;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::{Circuit, MEASURE_ALL_REGISTER};
pub use dag::{CircuitDag, CircuitLevel, DagEdge, DagNode, NodeIndex, WireId};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, Gate, GateKind, StandardGate};
pub use instruction::{Instruction, InstructionKind};
pub use parameter::ParameterExpression;
pub use qubit::{Clbit, ClbitId, Qubit, QubitId};
