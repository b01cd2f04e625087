//! OpenQASM 3 output for qpush circuits.
//!
//! IBM Quantum accepts circuits as OpenQASM 3 text, so this crate is the
//! last step before a circuit goes on the wire.
//!
//! ```rust
//! use qpush_ir::Circuit;
//! use qpush_qasm3::emit;
//!
//! let qasm = emit(&Circuit::bell()?)?;
//! assert!(qasm.contains("cx q[0], q[1];"));
//! assert!(qasm.contains("meas[1] = measure q[1];"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod emitter;
pub mod error;

pub use emitter::{EmitOptions, emit, emit_with};
pub use error::{EmitError, EmitResult};
