//! Pass trait and types for compilation passes.

use qpush_ir::CircuitDag;

use crate::error::CompileResult;
use crate::property::PropertySet;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Reads the DAG and records findings in the `PropertySet`.
    Analysis,
    /// Rewrites the DAG.
    Transformation,
}

/// A compilation pass that operates on a circuit DAG.
pub trait Pass: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> PassKind;

    /// Run the pass.
    ///
    /// Analysis passes must leave `dag` untouched. Transformation passes may
    /// read and update `properties` (routing moves the layout, for one).
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()>;

    /// Skip the pass when this returns `false`.
    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        true
    }
}
