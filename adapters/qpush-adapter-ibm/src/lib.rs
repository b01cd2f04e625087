//! IBM Quantum backend adapter for qpush.
//!
//! Connects to IBM Quantum through the Qiskit Runtime REST API, reads the
//! device's basis gates and coupling map, and submits Sampler V2 jobs
//! inside a runtime session.
//!
//! # Authentication
//!
//! On the default `ibm_quantum` channel the API token from
//! <https://quantum.ibm.com/account> is exchanged for an access token. The
//! `ibm_cloud` channel takes an IBM Cloud API key and the instance's
//! service CRN instead.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qpush_adapter_ibm::{IbmBackend, IbmConfig};
//! use qpush_hal::{Session, SessionOptions};
//!
//! let config = IbmConfig::new(std::env::var("IBM_API_TOKEN")?);
//! let backend = Arc::new(IbmBackend::connect(&config).await?);
//!
//! let session = Session::open(backend, &SessionOptions::default()).await?;
//! let job_id = session.sampler().run(&native_circuit).await?;
//! session.close().await?;
//! ```

mod api;
mod backend;
mod error;

pub use api::{
    Channel, DEFAULT_AUTH_URL, DEFAULT_CLOUD_RUNTIME_URL, DEFAULT_IAM_URL, DEFAULT_RUNTIME_URL,
    Endpoints, IbmClient,
};
pub use backend::{DEFAULT_BACKEND, DEFAULT_INSTANCE, IbmBackend, IbmConfig};
pub use error::{IbmError, IbmResult};
