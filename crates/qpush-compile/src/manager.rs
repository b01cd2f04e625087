//! Pass manager for orchestrating compilation.

use tracing::{debug, info, instrument};

use qpush_ir::CircuitDag;

use crate::error::{CompileError, CompileResult};
use crate::pass::Pass;
use crate::passes::{
    BasisTranslation, CancelTwoQubitPairs, DenseLayout, GateDirection,
    MeasurementBarrierVerification, MeasurementSnapshot, Optimize1qGates, ShortestPathRouting,
    TrivialLayout,
};
use crate::property::{BasisGates, CouplingMap, PropertySet};

/// Highest supported optimization level.
pub const MAX_OPTIMIZATION_LEVEL: u8 = 3;

/// Runs a sequence of compilation passes in order.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes on the given DAG, stopping at the first failure.
    #[instrument(skip(self, dag, properties))]
    pub fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        info!(
            "Running pass manager with {} passes on circuit with {} qubits",
            self.passes.len(),
            dag.num_qubits()
        );

        for pass in &self.passes {
            if pass.should_run(dag, properties) {
                debug!("Running pass: {}", pass.name());
                pass.run(dag, properties)?;
                debug!("Pass {} completed, ops: {}", pass.name(), dag.num_ops());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        info!(
            "Pass manager completed, final depth: {}, ops: {}",
            dag.depth(),
            dag.num_ops()
        );

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the preset pipeline for an optimization level.
///
/// | Level | Layout | Extra optimization |
/// |-------|--------|--------------------|
/// | 0 | trivial | none |
/// | 1 | trivial | 1q fusion |
/// | 2, 3 | dense | 1q fusion, 2q pair cancellation |
///
/// Routing, gate direction and basis translation always run when the
/// target provides a coupling map and basis. Every pipeline starts with a
/// measurement snapshot and ends with measurement verification.
pub struct PassManagerBuilder {
    optimization_level: u8,
    properties: PropertySet,
}

impl PassManagerBuilder {
    pub fn new() -> Self {
        Self {
            optimization_level: 1,
            properties: PropertySet::new(),
        }
    }

    /// Set the optimization level. Values above 3 are rejected by [`build`](Self::build).
    #[must_use]
    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    #[must_use]
    pub fn with_target(mut self, coupling_map: CouplingMap, basis_gates: BasisGates) -> Self {
        self.properties.coupling_map = Some(coupling_map);
        self.properties.basis_gates = Some(basis_gates);
        self
    }

    /// Build the pass manager and return it with the properties.
    pub fn build(self) -> CompileResult<(PassManager, PropertySet)> {
        let level = self.optimization_level;
        if level > MAX_OPTIMIZATION_LEVEL {
            return Err(CompileError::InvalidOptimizationLevel(level));
        }

        let mut pm = PassManager::new();
        pm.add_pass(MeasurementSnapshot);

        if self.properties.coupling_map.is_some() {
            if level >= 2 {
                pm.add_pass(DenseLayout);
            } else {
                pm.add_pass(TrivialLayout);
            }
            pm.add_pass(ShortestPathRouting);
            pm.add_pass(GateDirection);
        }

        if self.properties.basis_gates.is_some() {
            pm.add_pass(BasisTranslation);
        }

        if level >= 1 {
            pm.add_pass(Optimize1qGates::new());
        }
        if level >= 2 {
            pm.add_pass(CancelTwoQubitPairs);
            // Cancelled pairs can leave mergeable 1q runs behind.
            pm.add_pass(Optimize1qGates::new());
        }

        pm.add_pass(MeasurementBarrierVerification);

        Ok((pm, self.properties))
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
