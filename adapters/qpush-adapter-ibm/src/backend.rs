//! IBM Quantum backend implementation.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use qpush_hal::{
    Backend, BackendAvailability, Capabilities, GateSet, HalError, HalResult, JobId, JobStatus,
    SessionId, SessionOptions, Topology, TopologyKind, ValidationResult,
};
use qpush_ir::Circuit;
use qpush_qasm3::{EmitOptions, emit_with};

use crate::api::{
    BackendConfiguration, Channel, Endpoints, IbmClient, SamplerJobRequest, SessionRequest,
};
use crate::error::{IbmError, IbmResult};

/// Hub/group/project used when none is configured.
pub const DEFAULT_INSTANCE: &str = "ibm-q/open/main";

/// Backend targeted when none is configured.
pub const DEFAULT_BACKEND: &str = "ibm_brisbane";

/// Connection settings for [`IbmBackend::connect`].
#[derive(Clone)]
pub struct IbmConfig {
    pub channel: Channel,
    /// API token (`ibm_quantum`) or API key (`ibm_cloud`).
    pub token: String,
    pub backend: String,
    pub instance: String,
    /// Required on the `ibm_cloud` channel.
    pub service_crn: Option<String>,
    pub endpoints: Endpoints,
}

impl IbmConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            channel: Channel::IbmQuantum,
            token: token.into(),
            backend: DEFAULT_BACKEND.into(),
            instance: DEFAULT_INSTANCE.into(),
            service_crn: None,
            endpoints: Endpoints::for_channel(Channel::IbmQuantum),
        }
    }

    /// Switch channel. Resets endpoints to the channel's public URLs.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self.endpoints = Endpoints::for_channel(channel);
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_service_crn(mut self, crn: impl Into<String>) -> Self {
        self.service_crn = Some(crn.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl fmt::Debug for IbmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IbmConfig")
            .field("channel", &self.channel)
            .field("token", &"[REDACTED]")
            .field("backend", &self.backend)
            .field("instance", &self.instance)
            .field("service_crn", &self.service_crn)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// A connected IBM Quantum device.
///
/// Construction logs in and reads the device configuration once, so
/// [`Backend::capabilities`] never touches the network.
#[derive(Debug)]
pub struct IbmBackend {
    client: IbmClient,
    name: String,
    instance: String,
    capabilities: Capabilities,
}

impl IbmBackend {
    /// Log in and check that the configured backend is online.
    ///
    /// Fails with [`IbmError::BackendUnavailable`] when the backend is
    /// unknown to the account and [`IbmError::BackendOffline`] when it
    /// exists but is not accepting work.
    #[instrument(skip(config), fields(channel = %config.channel, backend = %config.backend))]
    pub async fn connect(config: &IbmConfig) -> IbmResult<Self> {
        let client = match config.channel {
            Channel::IbmQuantum => IbmClient::login(&config.endpoints, &config.token).await?,
            Channel::IbmCloud => {
                let crn = config
                    .service_crn
                    .as_deref()
                    .ok_or(IbmError::MissingServiceCrn)?;
                IbmClient::login_cloud(&config.endpoints, &config.token, crn).await?
            }
        };

        let configuration = client.backend_configuration(&config.backend).await?;
        let status = client.backend_status(&config.backend).await?;
        if !status.is_operational() {
            return Err(IbmError::BackendOffline {
                name: config.backend.clone(),
                status: status.describe(),
            });
        }

        let capabilities = capabilities_from(&configuration);
        info!(
            "Connected to {} ({} qubits, {} queued)",
            capabilities.name, capabilities.num_qubits, status.length_queue
        );

        Ok(Self {
            client,
            name: config.backend.clone(),
            instance: config.instance.clone(),
            capabilities,
        })
    }

    pub fn client(&self) -> &IbmClient {
        &self.client
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Circuit as OpenQASM 3 with the standard gate library included.
    fn circuit_to_qasm(circuit: &Circuit) -> IbmResult<String> {
        let options = EmitOptions {
            include_stdgates: true,
        };
        emit_with(circuit, &options).map_err(|e| IbmError::CircuitError(e.to_string()))
    }
}

/// Capabilities as reported by `/backends/{name}/configuration`.
fn capabilities_from(configuration: &BackendConfiguration) -> Capabilities {
    let gate_set = GateSet::from_names(&configuration.basis_gates);
    let mut topology = match &configuration.coupling_map {
        Some(pairs) => Topology::directed(pairs.iter().map(|&[a, b]| (a, b)).collect()),
        None => Topology::full(configuration.n_qubits),
    };
    let family = configuration
        .processor_type
        .as_ref()
        .map(|p| p.family.to_ascii_lowercase());
    if matches!(family.as_deref(), Some("eagle" | "heron")) {
        topology.kind = TopologyKind::HeavyHex;
    }

    let mut capabilities = Capabilities::ibm(
        configuration.backend_name.clone(),
        configuration.n_qubits,
        gate_set,
        topology,
    );
    if let Some(max_shots) = configuration.max_shots {
        capabilities = capabilities.with_max_shots(max_shots);
    }
    capabilities.is_simulator = configuration.simulator;
    capabilities
}

#[async_trait]
impl Backend for IbmBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn availability(&self) -> HalResult<BackendAvailability> {
        match self.client.backend_status(&self.name).await {
            Ok(status) if status.is_operational() => Ok(BackendAvailability {
                is_available: true,
                queue_depth: Some(status.length_queue),
                estimated_wait: None,
                status_message: Some(status.describe()),
            }),
            Ok(status) => Ok(BackendAvailability::unavailable(status.describe())),
            Err(e) => {
                warn!("IBM backend availability check failed: {e}");
                Ok(BackendAvailability::unavailable("failed to query backend"))
            }
        }
    }

    async fn validate(&self, circuit: &Circuit) -> HalResult<ValidationResult> {
        Ok(ValidationResult::check(&self.capabilities, circuit))
    }

    async fn open_session(&self, options: &SessionOptions) -> HalResult<SessionId> {
        let instance = match self.client.channel() {
            Channel::IbmQuantum => Some(self.instance.clone()),
            Channel::IbmCloud => None,
        };
        let request = SessionRequest {
            backend: self.name.clone(),
            instance,
            mode: options.mode,
            max_ttl: options.max_time.map(|d| d.as_secs()),
        };
        let response = self
            .client
            .create_session(&request)
            .await
            .map_err(|e| HalError::Session(e.to_string()))?;
        Ok(SessionId(response.id))
    }

    async fn close_session(&self, session: &SessionId) -> HalResult<()> {
        self.client
            .close_session(&session.0)
            .await
            .map_err(|e| HalError::Session(e.to_string()))
    }

    async fn submit(
        &self,
        circuit: &Circuit,
        shots: u32,
        session: Option<&SessionId>,
    ) -> HalResult<JobId> {
        if circuit.num_qubits() > self.capabilities.num_qubits as usize {
            return Err(IbmError::TooManyQubits {
                required: circuit.num_qubits(),
                available: self.capabilities.num_qubits,
            }
            .into());
        }

        let qasm = Self::circuit_to_qasm(circuit)?;
        debug!("Submitting {} bytes of OpenQASM to {}", qasm.len(), self.name);

        let request = SamplerJobRequest::sampler(
            self.name.clone(),
            session.map(|s| s.0.clone()),
            qasm,
            shots,
        );
        let response = self
            .client
            .submit_job(&request)
            .await
            .map_err(|e| match e {
                IbmError::AuthenticationFailed(_) => HalError::from(e),
                other => HalError::SubmissionFailed(other.to_string()),
            })?;
        Ok(JobId(response.id))
    }

    async fn status(&self, job_id: &JobId) -> HalResult<JobStatus> {
        let response = self.client.job_status(&job_id.0).await?;
        Ok(response.to_hal())
    }

    async fn cancel(&self, job_id: &JobId) -> HalResult<()> {
        self.client.cancel_job(&job_id.0).await?;
        Ok(())
    }
}
