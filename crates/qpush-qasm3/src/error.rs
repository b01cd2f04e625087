//! Error types for QASM emission.

use thiserror::Error;

/// Errors that stop a circuit from being written as OpenQASM.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmitError {
    /// A gate angle still refers to a symbol.
    #[error("Gate '{gate}' has unbound parameter '{symbol}'")]
    UnboundParameter { gate: String, symbol: String },

    /// A parameter evaluated to NaN or infinity.
    #[error("Gate '{gate}' has a non-finite parameter")]
    NonFiniteParameter { gate: String },
}

/// Result type for emission.
pub type EmitResult<T> = Result<T, EmitError>;
