//! qpush compilation framework.
//!
//! Turns a logical [`Circuit`] into one an IBM device accepts: every qubit
//! placed on a physical qubit, every two-qubit gate on a native coupling in
//! its native direction, and every gate in the device basis.
//!
//! ```text
//! Circuit ──► PassManager ◄── PropertySet (coupling map, basis, layout)
//!                │
//!                ├── MeasurementSnapshot
//!                ├── TrivialLayout / DenseLayout
//!                ├── ShortestPathRouting
//!                ├── GateDirection
//!                ├── BasisTranslation
//!                ├── Optimize1qGates / CancelTwoQubitPairs
//!                └── MeasurementBarrierVerification
//!                │
//!                ▼
//!        physical Circuit
//! ```
//!
//! # Example
//!
//! ```rust
//! use qpush_compile::{BasisGates, CouplingMap, Target, transpile};
//! use qpush_ir::Circuit;
//!
//! let target = Target::new("toy", CouplingMap::linear_directed(3), BasisGates::ibm_eagle());
//! let compiled = transpile(&Circuit::bell()?, &target, 3)?;
//!
//! assert_eq!(compiled.num_qubits(), 3);
//! assert_eq!(compiled.count_ops()["ecr"], 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Optimization Levels
//!
//! | Level | Passes Included |
//! |-------|-----------------|
//! | 0 | Trivial layout, routing, direction, translation |
//! | 1 | + single-qubit fusion |
//! | 2, 3 | Dense layout, + two-qubit pair cancellation |

pub mod error;
pub mod manager;
pub mod pass;
pub mod passes;
pub mod property;
pub mod unitary;

pub use error::{CompileError, CompileResult};
pub use manager::{MAX_OPTIMIZATION_LEVEL, PassManager, PassManagerBuilder};
pub use pass::{Pass, PassKind};
pub use property::{BasisGates, CouplingMap, Layout, PropertySet};

use qpush_ir::Circuit;
use tracing::{info, instrument};

/// A device as the compiler sees it.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub coupling_map: CouplingMap,
    pub basis_gates: BasisGates,
}

impl Target {
    pub fn new(name: impl Into<String>, coupling_map: CouplingMap, basis_gates: BasisGates) -> Self {
        Self {
            name: name.into(),
            coupling_map,
            basis_gates,
        }
    }

    pub fn num_qubits(&self) -> u32 {
        self.coupling_map.num_qubits()
    }
}

/// Compile `circuit` for `target` at `optimization_level` (0-3).
///
/// The result keeps the input's name and classical registers; its qubits
/// are the device's physical qubits.
#[instrument(skip(circuit, target), fields(circuit = circuit.name(), target = %target.name))]
pub fn transpile(circuit: &Circuit, target: &Target, optimization_level: u8) -> CompileResult<Circuit> {
    let (pm, mut properties) = PassManagerBuilder::new()
        .with_optimization_level(optimization_level)
        .with_target(target.coupling_map.clone(), target.basis_gates.clone())
        .build()?;

    let mut dag = circuit.dag().clone();
    pm.run(&mut dag, &mut properties)?;

    if let Some(layout) = &properties.layout {
        let placed: Vec<String> = layout.iter().map(|(l, p)| format!("{l}->{p}")).collect();
        info!("Final layout: {}", placed.join(", "));
    }

    Ok(circuit.with_dag(dag))
}
