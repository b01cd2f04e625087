//! Error types for the compilation crate.

use thiserror::Error;

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] qpush_ir::IrError),

    /// Missing coupling map for layout or routing.
    #[error("Missing coupling map for routing")]
    MissingCouplingMap,

    /// Routing ran before a layout was chosen.
    #[error("Missing layout for routing")]
    MissingLayout,

    /// Translation ran without a target basis.
    #[error("Missing basis gates for translation")]
    MissingBasisGates,

    /// Routing failed because qubits are not connected.
    #[error("Routing failed: qubits {qubit1} and {qubit2} not connected")]
    RoutingFailed { qubit1: u32, qubit2: u32 },

    /// A two-qubit gate sits on a pair the device cannot drive in either direction.
    #[error("No native coupling between physical qubits {qubit1} and {qubit2}")]
    UnsupportedCoupling { qubit1: u32, qubit2: u32 },

    /// Gate not in target basis.
    #[error("Gate '{0}' not in target basis")]
    GateNotInBasis(String),

    /// A gate parameter is still symbolic at translation time.
    #[error("Gate '{gate}' has unbound parameter '{symbol}'")]
    UnboundParameter { gate: String, symbol: String },

    /// Pass execution failed.
    #[error("Pass '{name}' failed: {reason}")]
    PassFailed { name: String, reason: String },

    /// Optimization level outside 0..=3.
    #[error("Invalid optimization level {0} (expected 0-3)")]
    InvalidOptimizationLevel(u8),

    /// Circuit too large for target.
    #[error("Circuit requires {required} qubits but target only has {available}")]
    CircuitTooLarge { required: usize, available: u32 },

    /// A pass moved an operation across a measurement on the same qubit,
    /// or changed the measurements themselves.
    #[error("Measurement order violated by '{gate_name}' on qubit {qubit}: {detail}")]
    MeasurementViolation {
        gate_name: String,
        qubit: u32,
        detail: String,
    },
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CompileError::CircuitTooLarge {
            required: 130,
            available: 127,
        };
        assert_eq!(
            err.to_string(),
            "Circuit requires 130 qubits but target only has 127"
        );

        let err = CompileError::InvalidOptimizationLevel(4);
        assert_eq!(err.to_string(), "Invalid optimization level 4 (expected 0-3)");
    }

    #[test]
    fn test_ir_error_converts() {
        let err: CompileError = qpush_ir::IrError::InvalidNode.into();
        assert!(matches!(err, CompileError::Ir(_)));
    }
}
