//! Error types for the IR crate.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Errors raised while building or editing a circuit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    #[error("Qubit {qubit} not found in circuit{}", gate_context(.gate_name))]
    QubitNotFound {
        qubit: QubitId,
        gate_name: Option<String>,
    },

    #[error("Classical bit {clbit} not found in circuit{}", gate_context(.gate_name))]
    ClbitNotFound {
        clbit: ClbitId,
        gate_name: Option<String>,
    },

    #[error("Invalid DAG structure: {0}")]
    InvalidDag(String),

    #[error("Invalid node index")]
    InvalidNode,

    /// Operand count does not match the gate arity.
    #[error("Gate '{gate_name}' requires {expected} qubits, got {got}")]
    QubitCountMismatch {
        gate_name: String,
        expected: u32,
        got: u32,
    },

    /// Measurement with a different number of qubits and clbits.
    #[error("Measurement maps {qubits} qubits onto {clbits} classical bits")]
    MeasureArity { qubits: usize, clbits: usize },

    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),

    #[error("Duplicate qubit {qubit} in operation{}", gate_context(.gate_name))]
    DuplicateQubit {
        qubit: QubitId,
        gate_name: Option<String>,
    },
}

#[allow(clippy::ref_option)]
fn gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
