//! The five stages of a run: credential, connection, circuit, transpilation,
//! submission. Each stage hands its output to the next; the first failure
//! stops the run.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use qpush_adapter_ibm::{IbmBackend, IbmConfig, IbmError};
use qpush_compile::{BasisGates, CouplingMap, Target, transpile};
use qpush_hal::{Backend, Capabilities, HalError, JobId, Session, SessionOptions};
use qpush_ir::{Circuit, QubitId};
use qpush_qasm3::{EmitOptions, emit_with};

/// Why a run stopped, by stage of origin.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Erreur: IBM_API_TOKEN manquant dans le fichier .env")]
    MissingCredential,

    #[error("Erreur de connexion à IBM Quantum: {0}")]
    Connection(#[source] IbmError),

    /// Building, compiling or rendering the circuit.
    #[error("Erreur lors de la transpilation: {0}")]
    Transpilation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Session setup, sampler construction or the run itself.
    #[error("Erreur lors de l'exécution du circuit: {0}")]
    Submission(#[source] HalError),
}

/// Log in and resolve the configured backend.
#[instrument(skip_all, fields(backend = %config.backend))]
pub async fn connect(config: &IbmConfig) -> Result<IbmBackend, StageError> {
    IbmBackend::connect(config)
        .await
        .map_err(StageError::Connection)
}

/// H on qubit 0, CX from 0 to 1, then measure both.
pub fn bell_circuit() -> Result<Circuit, StageError> {
    let mut circuit = Circuit::with_qreg("bell", 2);
    let (q0, q1) = (QubitId(0), QubitId(1));
    circuit
        .h(q0)
        .and_then(|c| c.cx(q0, q1))
        .and_then(|c| c.measure_all())
        .map_err(|e| StageError::Transpilation(e.into()))?;
    Ok(circuit)
}

/// The compiler's view of a device.
pub fn target_for(capabilities: &Capabilities) -> Target {
    Target::new(
        capabilities.name.clone(),
        CouplingMap::from_edges(
            capabilities.num_qubits,
            capabilities.topology.edges.iter().copied(),
        ),
        BasisGates::new(capabilities.gate_set.names()),
    )
}

/// Compile `circuit` for the device described by `capabilities`.
pub fn transpile_for(
    circuit: &Circuit,
    capabilities: &Capabilities,
    optimization_level: u8,
) -> Result<Circuit, StageError> {
    let target = target_for(capabilities);
    let compiled = transpile(circuit, &target, optimization_level)
        .map_err(|e| StageError::Transpilation(e.into()))?;
    info!(
        "Transpiled for {} at level {}: depth {}, ops {:?}",
        target.name,
        optimization_level,
        compiled.depth(),
        compiled.count_ops()
    );
    Ok(compiled)
}

/// The compiled circuit as it would be sent.
pub fn render_qasm(circuit: &Circuit) -> Result<String, StageError> {
    let options = EmitOptions {
        include_stdgates: true,
    };
    emit_with(circuit, &options).map_err(|e| StageError::Transpilation(e.into()))
}

/// Submit `circuit` as one sampling job inside a session.
///
/// The session is closed whether or not the job was accepted. A failed
/// close after a successful submission only logs a warning: the job is
/// already queued.
#[instrument(skip_all, fields(backend = backend.name(), shots = shots))]
pub async fn submit(
    backend: Arc<dyn Backend>,
    circuit: &Circuit,
    shots: u32,
) -> Result<JobId, StageError> {
    let session = Session::open(backend, &SessionOptions::default())
        .await
        .map_err(StageError::Submission)?;
    debug!("Session {} open", session.id());

    let outcome = session.sampler().with_shots(shots).run(circuit).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close session: {e}");
    }
    outcome.map_err(StageError::Submission)
}
