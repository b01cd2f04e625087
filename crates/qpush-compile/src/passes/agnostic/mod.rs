//! Target-agnostic passes.

mod optimization;
mod verification;

pub use optimization::{CancelTwoQubitPairs, OneQubitBasis, Optimize1qGates};
pub use verification::{
    MeasurementBarrierVerification, MeasurementProfile, MeasurementSnapshot, VerificationResult,
};
