//! Simulator errors.

use qpush_hal::HalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Circuit acts on {required} qubits; the simulator holds at most {max}")]
    TooManyQubits { required: usize, max: usize },

    #[error("Gate '{gate}' has an unbound parameter")]
    UnboundParameter { gate: String },

    #[error("Gate '{0}' cannot be simulated")]
    UnsupportedGate(String),

    #[error("Qubit {qubit} is used after it was measured")]
    MidCircuitMeasurement { qubit: u32 },

    #[error("Reset of qubit {qubit} after it was used")]
    UnsupportedReset { qubit: u32 },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<SimError> for HalError {
    fn from(e: SimError) -> Self {
        match e {
            SimError::TooManyQubits { .. } => HalError::CircuitTooLarge(e.to_string()),
            other => HalError::InvalidCircuit(other.to_string()),
        }
    }
}
