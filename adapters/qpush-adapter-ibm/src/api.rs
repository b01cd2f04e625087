//! IBM Quantum Runtime REST client.
//!
//! Two channels reach the same runtime API with different credentials:
//!
//! | Channel | Login | Runtime auth headers |
//! |---------|-------|----------------------|
//! | `ibm_quantum` | `POST {auth}/users/loginWithToken` | `X-Access-Token` |
//! | `ibm_cloud` | IAM API-key exchange | `Authorization: Bearer`, `Service-CRN` |
//!
//! Runtime calls used by qpush: backend configuration and status, session
//! create/close, Sampler V2 job submission, job status and cancellation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use qpush_hal::SessionMode;

use crate::error::{IbmError, IbmResult};

/// IBM Quantum Platform authentication endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://auth.quantum-computing.ibm.com/api";

/// IBM Quantum Platform runtime endpoint.
pub const DEFAULT_RUNTIME_URL: &str = "https://api.quantum-computing.ibm.com/runtime";

/// IBM Cloud runtime endpoint.
pub const DEFAULT_CLOUD_RUNTIME_URL: &str = "https://us-east.quantum-computing.cloud.ibm.com";

/// IBM Cloud IAM endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("qpush/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the client authenticates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Channel {
    /// IBM Quantum Platform, API token.
    #[default]
    IbmQuantum,
    /// IBM Cloud, API key plus service CRN.
    IbmCloud,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::IbmQuantum => "ibm_quantum",
            Channel::IbmCloud => "ibm_cloud",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = IbmError;

    fn from_str(s: &str) -> IbmResult<Self> {
        match s {
            "ibm_quantum" => Ok(Channel::IbmQuantum),
            "ibm_cloud" => Ok(Channel::IbmCloud),
            other => Err(IbmError::InvalidParameter(format!(
                "unknown channel '{other}' (expected ibm_quantum or ibm_cloud)"
            ))),
        }
    }
}

/// Service URLs. Overridable so tests can point at a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_url: String,
    pub runtime_url: String,
    pub iam_url: String,
}

impl Endpoints {
    /// Public endpoints for `channel`.
    pub fn for_channel(channel: Channel) -> Self {
        let runtime_url = match channel {
            Channel::IbmQuantum => DEFAULT_RUNTIME_URL,
            Channel::IbmCloud => DEFAULT_CLOUD_RUNTIME_URL,
        };
        Self {
            auth_url: DEFAULT_AUTH_URL.into(),
            runtime_url: runtime_url.into(),
            iam_url: DEFAULT_IAM_URL.into(),
        }
    }

    /// Every endpoint under one base URL.
    pub fn local(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: base.into(),
            runtime_url: base.into(),
            iam_url: base.into(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::for_channel(Channel::default())
    }
}

/// Authenticated IBM Quantum Runtime client.
pub struct IbmClient {
    client: Client,
    runtime_url: String,
    channel: Channel,
    /// Access token obtained at login.
    access_token: String,
}

impl fmt::Debug for IbmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IbmClient")
            .field("runtime_url", &self.runtime_url)
            .field("channel", &self.channel)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

fn plain_client() -> IbmResult<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

fn header_value(value: &str) -> IbmResult<header::HeaderValue> {
    header::HeaderValue::from_str(value).map_err(|_| IbmError::InvalidToken)
}

impl IbmClient {
    /// Log in on the `ibm_quantum` channel.
    ///
    /// Exchanges the API token for an access token at
    /// `{auth_url}/users/loginWithToken`.
    pub async fn login(endpoints: &Endpoints, api_token: &str) -> IbmResult<Self> {
        let url = format!("{}/users/loginWithToken", endpoints.auth_url);
        let response = plain_client()?
            .post(&url)
            .json(&LoginRequest { api_token })
            .send()
            .await?;
        let login: LoginResponse = checked(response, "login").await?.json().await?;
        debug!("Logged in to IBM Quantum");

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_static("x-access-token"),
            header_value(&login.id)?,
        );
        Self::build(endpoints, Channel::IbmQuantum, headers, login.id)
    }

    /// Log in on the `ibm_cloud` channel via IAM.
    pub async fn login_cloud(
        endpoints: &Endpoints,
        api_key: &str,
        service_crn: &str,
    ) -> IbmResult<Self> {
        let url = format!("{}/identity/token", endpoints.iam_url);
        let response = plain_client()?
            .post(&url)
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", api_key),
            ])
            .send()
            .await
            .map_err(|e| IbmError::IamTokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IbmError::IamTokenExchange(format!(
                "IAM returned {status}: {body}"
            )));
        }
        let iam: IamTokenResponse = response.json().await.map_err(|e| {
            IbmError::IamTokenExchange(format!("failed to parse IAM response: {e}"))
        })?;
        debug!("Obtained IAM bearer token");

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header_value(&format!("Bearer {}", iam.access_token))?,
        );
        headers.insert(
            header::HeaderName::from_static("service-crn"),
            header::HeaderValue::from_str(service_crn)
                .map_err(|_| IbmError::InvalidParameter("invalid Service-CRN value".into()))?,
        );
        Self::build(endpoints, Channel::IbmCloud, headers, iam.access_token)
    }

    fn build(
        endpoints: &Endpoints,
        channel: Channel,
        mut headers: header::HeaderMap,
        access_token: String,
    ) -> IbmResult<Self> {
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            runtime_url: endpoints.runtime_url.trim_end_matches('/').to_string(),
            channel,
            access_token,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.runtime_url)
    }

    /// `GET /backends/{name}/configuration`. A 404 means the backend does not
    /// exist for this account.
    pub async fn backend_configuration(&self, name: &str) -> IbmResult<BackendConfiguration> {
        let response = self
            .client
            .get(self.url(&format!("/backends/{name}/configuration")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IbmError::BackendUnavailable(name.to_string()));
        }
        Ok(checked(response, "backend configuration").await?.json().await?)
    }

    /// `GET /backends/{name}/status`.
    pub async fn backend_status(&self, name: &str) -> IbmResult<BackendStatusResponse> {
        let response = self
            .client
            .get(self.url(&format!("/backends/{name}/status")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IbmError::BackendUnavailable(name.to_string()));
        }
        Ok(checked(response, "backend status").await?.json().await?)
    }

    /// `POST /sessions`.
    pub async fn create_session(&self, request: &SessionRequest) -> IbmResult<SessionResponse> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .json(request)
            .send()
            .await?;
        Ok(checked(response, "session creation").await?.json().await?)
    }

    /// Stop a session from accepting jobs. Jobs already queued still run.
    pub async fn close_session(&self, session_id: &str) -> IbmResult<()> {
        let response = self
            .client
            .patch(self.url(&format!("/sessions/{session_id}")))
            .json(&serde_json::json!({ "accepting_jobs": false }))
            .send()
            .await?;
        checked(response, "session close").await?;
        Ok(())
    }

    /// `POST /jobs`.
    pub async fn submit_job(&self, request: &SamplerJobRequest) -> IbmResult<SubmitResponse> {
        let response = self
            .client
            .post(self.url("/jobs"))
            .json(request)
            .send()
            .await?;
        Ok(checked(response, "job submission").await?.json().await?)
    }

    /// `GET /jobs/{id}`.
    pub async fn job_status(&self, job_id: &str) -> IbmResult<JobStatusResponse> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{job_id}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IbmError::JobNotFound(job_id.to_string()));
        }
        Ok(checked(response, "job status").await?.json().await?)
    }

    /// `POST /jobs/{id}/cancel`.
    pub async fn cancel_job(&self, job_id: &str) -> IbmResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{job_id}/cancel")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IbmError::JobNotFound(job_id.to_string()));
        }
        checked(response, "job cancel").await?;
        Ok(())
    }
}

/// Pass successful responses through; turn the rest into [`IbmError`].
async fn checked(response: Response, context: &str) -> IbmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
    let (code, message) = match parsed {
        Some(err) => err.into_parts(),
        None => (None, body),
    };
    let message = if message.is_empty() {
        format!("{context} failed")
    } else {
        format!("{context} failed: {message}")
    };

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(IbmError::AuthenticationFailed(message));
    }
    Err(IbmError::ApiError {
        status: status.as_u16(),
        code,
        message,
    })
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    api_token: &'a str,
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub backend: String,
    /// Hub/group/project, `ibm_quantum` channel only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub mode: SessionMode,
    /// Session lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ttl: Option<u64>,
}

/// One Sampler V2 PUB: circuit, parameter values, shots.
#[derive(Debug, Clone, Serialize)]
pub struct SamplerPub(
    pub String,
    pub serde_json::Map<String, serde_json::Value>,
    pub u32,
);

impl SamplerPub {
    pub fn new(qasm: String, shots: u32) -> Self {
        Self(qasm, serde_json::Map::new(), shots)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SamplerParams {
    pub pubs: Vec<SamplerPub>,
    pub version: u8,
}

/// Body of `POST /jobs` for the Sampler primitive.
#[derive(Debug, Clone, Serialize)]
pub struct SamplerJobRequest {
    pub program_id: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub params: SamplerParams,
}

impl SamplerJobRequest {
    /// A Sampler V2 job over one circuit.
    pub fn sampler(
        backend: impl Into<String>,
        session_id: Option<String>,
        qasm: String,
        shots: u32,
    ) -> Self {
        Self {
            program_id: "sampler".into(),
            backend: backend.into(),
            session_id,
            params: SamplerParams {
                pubs: vec![SamplerPub::new(qasm, shots)],
                version: 2,
            },
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Deserialize)]
struct LoginResponse {
    id: String,
}

#[derive(Deserialize)]
struct IamTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

/// Error bodies come as `{"errors": [...]}` or as a flat `{"message"}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn into_parts(self) -> (Option<String>, String) {
        if let Some(first) = self.errors.into_iter().next() {
            let code = first.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            return (code, first.message);
        }
        (None, self.message.or(self.error).unwrap_or_default())
    }
}

/// Response of `GET /backends/{name}/configuration`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfiguration {
    pub backend_name: String,
    pub n_qubits: u32,
    #[serde(default)]
    pub basis_gates: Vec<String>,
    /// Directed `[control, target]` pairs.
    #[serde(default)]
    pub coupling_map: Option<Vec<[u32; 2]>>,
    #[serde(default)]
    pub processor_type: Option<ProcessorType>,
    #[serde(default)]
    pub simulator: bool,
    #[serde(default)]
    pub max_shots: Option<u32>,
}

/// Processor family, e.g. "Eagle" or "Heron".
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorType {
    pub family: String,
    #[serde(default)]
    pub revision: Option<serde_json::Value>,
}

/// Response of `GET /backends/{name}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendStatusResponse {
    /// Whether the backend is operational.
    pub state: bool,
    /// e.g. "active", "internal", "offline".
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub length_queue: u32,
}

impl BackendStatusResponse {
    pub fn is_operational(&self) -> bool {
        self.state && !self.status.eq_ignore_ascii_case("offline")
    }

    /// Human-readable status for error messages.
    pub fn describe(&self) -> String {
        match (self.status.is_empty(), self.message.is_empty()) {
            (true, true) => "not operational".into(),
            (false, true) => self.status.clone(),
            (true, false) => self.message.clone(),
            (false, false) => format!("{} ({})", self.status, self.message),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub id: String,
    #[serde(default)]
    pub backend: Option<String>,
}

/// Response of `GET /jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub id: String,
    /// Mixed case on some deployments ("Completed" vs "COMPLETED").
    pub status: String,
    #[serde(default)]
    pub state: Option<JobState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl JobStatusResponse {
    /// Map onto the HAL job state machine.
    pub fn to_hal(&self) -> qpush_hal::JobStatus {
        use qpush_hal::JobStatus;

        match self.status.to_ascii_uppercase().as_str() {
            "RUNNING" => JobStatus::Running,
            "COMPLETED" | "DONE" => JobStatus::Completed,
            "CANCELLED" | "CANCELED" => JobStatus::Cancelled,
            "FAILED" | "ERROR" => JobStatus::Failed(
                self.state
                    .as_ref()
                    .and_then(|s| s.reason.clone())
                    .unwrap_or_else(|| "no reason given".into()),
            ),
            _ => JobStatus::Queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpush_hal::JobStatus;

    #[test]
    fn test_channel_parsing() {
        assert_eq!("ibm_quantum".parse::<Channel>().unwrap(), Channel::IbmQuantum);
        assert_eq!("ibm_cloud".parse::<Channel>().unwrap(), Channel::IbmCloud);
        assert!("ibmq".parse::<Channel>().is_err());
        assert_eq!(Channel::IbmCloud.to_string(), "ibm_cloud");
    }

    #[test]
    fn test_sampler_request_shape() {
        let request = SamplerJobRequest::sampler(
            "ibm_brisbane",
            Some("sess-1".into()),
            "OPENQASM 3.0;".into(),
            4096,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "program_id": "sampler",
                "backend": "ibm_brisbane",
                "session_id": "sess-1",
                "params": {
                    "pubs": [["OPENQASM 3.0;", {}, 4096]],
                    "version": 2
                }
            })
        );
    }

    #[test]
    fn test_session_request_omits_empty_fields() {
        let request = SessionRequest {
            backend: "ibm_brisbane".into(),
            instance: None,
            mode: SessionMode::Dedicated,
            max_ttl: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"backend":"ibm_brisbane","mode":"dedicated"}"#);
    }

    #[test]
    fn test_backend_configuration_deserialization() {
        let json = r#"{
            "backend_name": "ibm_brisbane",
            "n_qubits": 127,
            "basis_gates": ["ecr", "id", "rz", "sx", "x"],
            "coupling_map": [[1, 0], [2, 1], [3, 2]],
            "processor_type": {"family": "Eagle", "revision": 3},
            "simulator": false
        }"#;
        let config: BackendConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.n_qubits, 127);
        assert_eq!(config.coupling_map.unwrap()[0], [1, 0]);
        assert_eq!(config.processor_type.unwrap().family, "Eagle");
        assert!(config.max_shots.is_none());
    }

    #[test]
    fn test_backend_status_operational() {
        let status: BackendStatusResponse =
            serde_json::from_str(r#"{"state": true, "status": "active", "length_queue": 12}"#)
                .unwrap();
        assert!(status.is_operational());

        let offline: BackendStatusResponse =
            serde_json::from_str(r#"{"state": false, "status": "offline", "message": "calibrating"}"#)
                .unwrap();
        assert!(!offline.is_operational());
        assert_eq!(offline.describe(), "offline (calibrating)");
    }

    #[test]
    fn test_job_status_mapping() {
        let parse = |json: &str| serde_json::from_str::<JobStatusResponse>(json).unwrap().to_hal();
        assert_eq!(parse(r#"{"id": "j", "status": "Queued"}"#), JobStatus::Queued);
        assert_eq!(parse(r#"{"id": "j", "status": "RUNNING"}"#), JobStatus::Running);
        assert_eq!(parse(r#"{"id": "j", "status": "Completed"}"#), JobStatus::Completed);
        assert_eq!(
            parse(r#"{"id": "j", "status": "Failed", "state": {"status": "Failed", "reason": "too deep"}}"#),
            JobStatus::Failed("too deep".into())
        );
    }

    #[test]
    fn test_error_body_forms() {
        let nested: ApiErrorBody =
            serde_json::from_str(r#"{"errors": [{"code": 1211, "message": "bad backend"}]}"#)
                .unwrap();
        assert_eq!(
            nested.into_parts(),
            (Some("1211".to_string()), "bad backend".to_string())
        );

        let flat: ApiErrorBody = serde_json::from_str(r#"{"message": "nope"}"#).unwrap();
        assert_eq!(flat.into_parts(), (None, "nope".to_string()));
    }

    #[test]
    fn test_local_endpoints_strip_slash() {
        let endpoints = Endpoints::local("http://127.0.0.1:1234/");
        assert_eq!(endpoints.runtime_url, "http://127.0.0.1:1234");
        assert_eq!(endpoints.auth_url, endpoints.iam_url);
    }
}
