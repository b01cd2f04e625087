//! Error types for the IBM Quantum adapter.

use qpush_hal::HalError;
use thiserror::Error;

/// Result type for IBM operations.
pub type IbmResult<T> = Result<T, IbmError>;

/// Errors that can occur when talking to IBM Quantum.
#[derive(Debug, Error)]
pub enum IbmError {
    /// The token cannot be placed in an HTTP header.
    #[error("Invalid IBM Quantum API token")]
    InvalidToken,

    /// The service rejected the credential.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// IAM token exchange failed.
    #[error("IAM token exchange failed: {0}")]
    IamTokenExchange(String),

    #[error("The ibm_cloud channel requires a service CRN (IBM_SERVICE_CRN)")]
    MissingServiceCrn,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("IBM Quantum API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error code from the body, when present.
        code: Option<String>,
        message: String,
    },

    /// The named backend does not exist or is not visible to this account.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Backend {name} is offline: {status}")]
    BackendOffline { name: String, status: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Circuit conversion error.
    #[error("Circuit conversion error: {0}")]
    CircuitError(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Circuit requires {required} qubits but backend only has {available}")]
    TooManyQubits { required: usize, available: u32 },

    /// Invalid parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<IbmError> for HalError {
    fn from(e: IbmError) -> Self {
        match e {
            IbmError::InvalidToken
            | IbmError::AuthenticationFailed(_)
            | IbmError::IamTokenExchange(_)
            | IbmError::MissingServiceCrn => HalError::AuthenticationFailed(e.to_string()),
            IbmError::HttpError(e) => HalError::Network(e),
            IbmError::JsonError(e) => HalError::Serialization(e),
            IbmError::BackendUnavailable(_) | IbmError::BackendOffline { .. } => {
                HalError::BackendUnavailable(e.to_string())
            }
            IbmError::JobNotFound(id) => HalError::JobNotFound(id),
            IbmError::TooManyQubits { .. } => HalError::CircuitTooLarge(e.to_string()),
            IbmError::CircuitError(msg) => HalError::InvalidCircuit(msg),
            IbmError::InvalidParameter(msg) => HalError::Configuration(msg),
            IbmError::ApiError { .. } => HalError::Backend(e.to_string()),
        }
    }
}
