//! Built-in compilation passes.
//!
//! - [`agnostic`]: passes that only look at DAG structure
//! - [`target`]: passes that need the device coupling map or basis

pub mod agnostic;
pub mod target;

pub use agnostic::{
    CancelTwoQubitPairs, MeasurementBarrierVerification, MeasurementProfile, MeasurementSnapshot,
    OneQubitBasis, Optimize1qGates, VerificationResult,
};
pub use target::{
    BasisTranslation, DenseLayout, Entangler, GateDirection, RoutingStats, ShortestPathRouting,
    TrivialLayout,
};
