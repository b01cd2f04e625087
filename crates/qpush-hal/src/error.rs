//! HAL errors.
//!
//! Adapters convert their own error types into [`HalError`] so callers can
//! tell a rejected credential from an unreachable device or a bad circuit.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// The device is unknown, offline or in maintenance.
    #[error("backend {0} is not available")]
    BackendUnavailable(String),

    #[error("credential rejected: {0}")]
    AuthenticationFailed(String),

    /// Opening or releasing a runtime session failed.
    #[error("session: {0}")]
    Session(String),

    /// The provider refused the job.
    #[error("job rejected: {0}")]
    SubmissionFailed(String),

    #[error("no job with id {0}")]
    JobNotFound(String),

    /// The circuit cannot run as-is, usually because it was not transpiled
    /// for the device.
    #[error("circuit not executable: {0}")]
    InvalidCircuit(String),

    #[error("circuit too large: {0}")]
    CircuitTooLarge(String),

    #[error("shot count {requested} outside 1..={max}")]
    InvalidShots { requested: u32, max: u32 },

    #[error("invalid backend configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other provider-side failure.
    #[error("{0}")]
    Backend(String),
}

pub type HalResult<T> = Result<T, HalError>;
