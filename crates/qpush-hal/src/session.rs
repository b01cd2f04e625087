//! Session guard and sampler.
//!
//! A [`Session`] holds a backend session open for as long as it lives.
//! Call [`Session::close`] to release it and see the outcome; a session
//! dropped without `close` is released in the background.

use std::sync::Arc;

use tracing::{debug, info, warn};

use qpush_ir::Circuit;

use crate::backend::{Backend, ValidationResult};
use crate::error::{HalError, HalResult};
use crate::job::{JobId, SessionId, SessionOptions};

/// Shots per job when the caller does not choose.
pub const DEFAULT_SHOTS: u32 = 4096;

/// An open backend session.
pub struct Session {
    backend: Arc<dyn Backend>,
    id: SessionId,
    closed: bool,
}

impl Session {
    /// Open a session on `backend`.
    pub async fn open(backend: Arc<dyn Backend>, options: &SessionOptions) -> HalResult<Self> {
        let id = backend.open_session(options).await?;
        info!("Opened {} session {} on {}", options.mode.as_str(), id, backend.name());
        Ok(Self {
            backend,
            id,
            closed: false,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// A sampler that submits into this session with [`DEFAULT_SHOTS`].
    pub fn sampler(&self) -> Sampler<'_> {
        Sampler {
            session: self,
            shots: DEFAULT_SHOTS,
        }
    }

    /// Release the session.
    pub async fn close(mut self) -> HalResult<()> {
        self.closed = true;
        self.backend.close_session(&self.id).await?;
        info!("Closed session {}", self.id);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let backend = Arc::clone(&self.backend);
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Session {id} dropped without close(); releasing in background");
                handle.spawn(async move {
                    if let Err(e) = backend.close_session(&id).await {
                        warn!("Background release of session {id} failed: {e}");
                    }
                });
            }
            Err(_) => {
                warn!("Session {id} dropped outside a runtime; it stays open until the backend expires it");
            }
        }
    }
}

/// Submits circuits as sampling jobs inside a [`Session`].
pub struct Sampler<'s> {
    session: &'s Session,
    shots: u32,
}

impl Sampler<'_> {
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }

    pub fn shots(&self) -> u32 {
        self.shots
    }

    /// Validate `circuit` and submit it as one job.
    ///
    /// The circuit must already be in the backend's native form; anything
    /// that still needs transpiling is rejected before it reaches the
    /// backend.
    pub async fn run(&self, circuit: &Circuit) -> HalResult<JobId> {
        let backend = self.session.backend();
        let max_shots = backend.capabilities().max_shots;
        if self.shots == 0 || self.shots > max_shots {
            return Err(HalError::InvalidShots {
                requested: self.shots,
                max: max_shots,
            });
        }

        match backend.validate(circuit).await? {
            ValidationResult::Valid => {}
            ValidationResult::Invalid { reasons } => {
                return Err(HalError::InvalidCircuit(reasons.join("; ")));
            }
            ValidationResult::RequiresTranspilation { details } => {
                return Err(HalError::InvalidCircuit(format!(
                    "not in native form for {}: {details}",
                    backend.name()
                )));
            }
        }

        debug!(
            "Submitting {} with {} shots in session {}",
            circuit.name(),
            self.shots,
            self.session.id
        );
        let job_id = backend.submit(circuit, self.shots, Some(&self.session.id)).await?;
        info!("Submitted job {job_id}");
        Ok(job_id)
    }
}
