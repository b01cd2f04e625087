//! qpush Local Statevector Simulator
//!
//! A [`Backend`](qpush_hal::Backend) that runs circuits in memory. Its main
//! job is checking compiled output: give it the capabilities of a device,
//! submit the transpiled circuit through a session, and compare the
//! outcome distribution with the logical circuit's.
//!
//! # Performance
//!
//! Cost depends on the qubits a circuit touches, not on its width.
//!
//! | Active qubits | Memory |
//! |---------------|--------|
//! | 10 | ~16 KB |
//! | 20 | ~16 MB |
//! | 24 | ~256 MB |
//!
//! # Example
//!
//! ```rust
//! use qpush_adapter_sim::SimulatorBackend;
//! use qpush_ir::Circuit;
//!
//! let backend = SimulatorBackend::new(2).with_seed(1);
//! let result = backend.run(&Circuit::bell()?, 1000)?;
//!
//! assert_eq!(result.count("00") + result.count("11"), 1000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod simulator;
mod statevector;

pub use error::{SimError, SimResult};
pub use simulator::{DEFAULT_MAX_ACTIVE_QUBITS, SampleResult, SimulatorBackend};
