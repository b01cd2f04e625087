//! qpush Hardware Abstraction Layer
//!
//! A common [`Backend`] trait for IBM Quantum and the local simulator, the
//! [`Capabilities`] a backend reports, and the [`Session`] guard that jobs
//! are submitted through.
//!
//! # Supported Backends
//!
//! | Backend | Crate | Authentication |
//! |---------|-------|----------------|
//! | Local statevector simulator | `qpush-adapter-sim` | None |
//! | IBM Quantum | `qpush-adapter-ibm` | `IBM_API_TOKEN` |
//!
//! # Example: submitting in a session
//!
//! ```ignore
//! use std::sync::Arc;
//! use qpush_hal::{Session, SessionOptions};
//! use qpush_adapter_sim::SimulatorBackend;
//! use qpush_ir::Circuit;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(SimulatorBackend::new(2));
//!     let session = Session::open(backend, &SessionOptions::default()).await?;
//!
//!     let job_id = session.sampler().run(&Circuit::bell()?).await?;
//!     println!("Job ID: {job_id}");
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod capability;
pub mod error;
pub mod job;
pub mod session;

pub use backend::{Backend, BackendAvailability, ValidationResult};
pub use capability::{Capabilities, GateSet, Topology, TopologyKind};
pub use error::{HalError, HalResult};
pub use job::{JobId, JobStatus, SessionId, SessionMode, SessionOptions};
pub use session::{DEFAULT_SHOTS, Sampler, Session};
