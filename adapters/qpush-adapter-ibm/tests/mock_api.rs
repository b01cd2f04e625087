//! IbmBackend against a local mock of the IBM Quantum REST API.

use std::sync::Arc;

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

use qpush_adapter_ibm::{Channel, Endpoints, IbmBackend, IbmConfig, IbmError};
use qpush_compile::{BasisGates, CouplingMap, Target, transpile};
use qpush_hal::{Backend, HalError, JobId, JobStatus, Session, SessionOptions, TopologyKind};
use qpush_ir::Circuit;

const TOKEN: &str = "test-token";
const ACCESS: &str = "access-1";
const EDGES: [(u32, u32); 4] = [(0, 1), (2, 1), (2, 3), (4, 3)];

fn config(server: &ServerGuard) -> IbmConfig {
    IbmConfig::new(TOKEN)
        .with_backend("fake_eagle")
        .with_endpoints(Endpoints::local(&server.url()))
}

fn configuration_body() -> String {
    json!({
        "backend_name": "fake_eagle",
        "n_qubits": 5,
        "basis_gates": ["ecr", "id", "rz", "sx", "x"],
        "coupling_map": EDGES.iter().map(|&(a, b)| [a, b]).collect::<Vec<_>>(),
        "processor_type": {"family": "Eagle", "revision": 3},
        "simulator": false,
        "max_shots": 100000
    })
    .to_string()
}

async fn mock_login(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/users/loginWithToken")
        .match_body(Matcher::PartialJson(json!({ "apiToken": TOKEN })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": ACCESS }).to_string())
        .create_async()
        .await
}

async fn mock_configuration(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/backends/fake_eagle/configuration")
        .match_header("x-access-token", ACCESS)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(configuration_body())
        .create_async()
        .await
}

async fn mock_status(server: &mut ServerGuard, state: bool, status: &str) -> Mock {
    server
        .mock("GET", "/backends/fake_eagle/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "state": state, "status": status, "length_queue": 3 }).to_string())
        .create_async()
        .await
}

fn target() -> Target {
    Target::new(
        "fake_eagle",
        CouplingMap::from_edges(5, EDGES),
        BasisGates::ibm_eagle(),
    )
}

#[tokio::test]
async fn test_connect_reads_device_configuration() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server).await;
    let configuration = mock_configuration(&mut server).await;
    let status = mock_status(&mut server, true, "active").await;

    let backend = IbmBackend::connect(&config(&server)).await.unwrap();
    let caps = backend.capabilities();
    assert_eq!(backend.name(), "fake_eagle");
    assert_eq!(backend.instance(), "ibm-q/open/main");
    assert_eq!(caps.num_qubits, 5);
    assert!(caps.gate_set.contains("ecr"));
    assert!(!caps.gate_set.contains("cx"));
    assert_eq!(caps.topology.kind, TopologyKind::HeavyHex);
    assert!(caps.topology.supports(2, 1));
    assert!(!caps.topology.supports(1, 2));

    login.assert_async().await;
    configuration.assert_async().await;
    status.assert_async().await;
}

#[tokio::test]
async fn test_unknown_backend() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _missing = server
        .mock("GET", "/backends/fake_eagle/configuration")
        .with_status(404)
        .with_body(json!({ "errors": [{ "message": "not found" }] }).to_string())
        .create_async()
        .await;

    let err = IbmBackend::connect(&config(&server)).await.unwrap_err();
    assert!(matches!(err, IbmError::BackendUnavailable(ref name) if name == "fake_eagle"));
    assert!(matches!(HalError::from(err), HalError::BackendUnavailable(_)));
}

#[tokio::test]
async fn test_rejected_token() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/users/loginWithToken")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": { "statusCode": 401 }, "message": "Login failed." }).to_string())
        .create_async()
        .await;
    let configuration = server
        .mock("GET", "/backends/fake_eagle/configuration")
        .expect(0)
        .create_async()
        .await;

    let err = IbmBackend::connect(&config(&server)).await.unwrap_err();
    assert!(matches!(err, IbmError::AuthenticationFailed(_)), "{err}");
    configuration.assert_async().await;
}

#[tokio::test]
async fn test_offline_backend_fails_to_connect() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _configuration = mock_configuration(&mut server).await;
    let _status = mock_status(&mut server, false, "offline").await;

    let err = IbmBackend::connect(&config(&server)).await.unwrap_err();
    assert!(matches!(err, IbmError::BackendOffline { .. }), "{err}");
    assert!(err.to_string().contains("offline"));
}

#[tokio::test]
async fn test_sampler_job_in_session() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _configuration = mock_configuration(&mut server).await;
    let _status = mock_status(&mut server, true, "active").await;

    let open = server
        .mock("POST", "/sessions")
        .match_header("x-access-token", ACCESS)
        .match_body(Matcher::PartialJson(json!({
            "backend": "fake_eagle",
            "instance": "ibm-q/open/main",
            "mode": "dedicated"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "sess-1" }).to_string())
        .create_async()
        .await;

    let job = server
        .mock("POST", "/jobs")
        .match_header("x-access-token", ACCESS)
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "program_id": "sampler",
                "backend": "fake_eagle",
                "session_id": "sess-1",
                "params": { "version": 2 }
            })),
            Matcher::Regex(r#"stdgates\.inc"#.into()),
            Matcher::Regex(r#"\{\},4096\]\]"#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "job-42", "backend": "fake_eagle" }).to_string())
        .create_async()
        .await;

    let close = server
        .mock("PATCH", "/sessions/sess-1")
        .match_body(Matcher::Json(json!({ "accepting_jobs": false })))
        .with_status(204)
        .create_async()
        .await;

    let backend = Arc::new(IbmBackend::connect(&config(&server)).await.unwrap());
    let compiled = transpile(&Circuit::bell().unwrap(), &target(), 3).unwrap();

    let session = Session::open(backend, &SessionOptions::default())
        .await
        .unwrap();
    let job_id = session.sampler().run(&compiled).await.unwrap();
    session.close().await.unwrap();

    assert_eq!(job_id.to_string(), "job-42");
    open.assert_async().await;
    job.assert_async().await;
    close.assert_async().await;
}

#[tokio::test]
async fn test_logical_circuit_never_reaches_the_api() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _configuration = mock_configuration(&mut server).await;
    let _status = mock_status(&mut server, true, "active").await;
    let _open = server
        .mock("POST", "/sessions")
        .with_status(200)
        .with_body(json!({ "id": "sess-1" }).to_string())
        .create_async()
        .await;
    let job = server.mock("POST", "/jobs").expect(0).create_async().await;
    let _close = server
        .mock("PATCH", "/sessions/sess-1")
        .with_status(204)
        .create_async()
        .await;

    let backend = Arc::new(IbmBackend::connect(&config(&server)).await.unwrap());
    let session = Session::open(backend, &SessionOptions::default())
        .await
        .unwrap();
    let err = session
        .sampler()
        .run(&Circuit::bell().unwrap())
        .await
        .unwrap_err();
    session.close().await.unwrap();

    assert!(matches!(err, HalError::InvalidCircuit(_)), "{err}");
    job.assert_async().await;
}

#[tokio::test]
async fn test_cloud_channel_exchanges_api_key() {
    let mut server = Server::new_async().await;
    let iam = server
        .mock("POST", "/identity/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "grant_type".into(),
                "urn:ibm:params:oauth:grant-type:apikey".into(),
            ),
            Matcher::UrlEncoded("apikey".into(), "cloud-key".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "access_token": "iam-1", "token_type": "Bearer", "expires_in": 3600 })
                .to_string(),
        )
        .create_async()
        .await;
    let configuration = server
        .mock("GET", "/backends/fake_eagle/configuration")
        .match_header("authorization", "Bearer iam-1")
        .match_header("service-crn", "crn:v1:test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(configuration_body())
        .create_async()
        .await;
    let _status = mock_status(&mut server, true, "active").await;

    let config = IbmConfig::new("cloud-key")
        .with_channel(Channel::IbmCloud)
        .with_backend("fake_eagle")
        .with_service_crn("crn:v1:test")
        .with_endpoints(Endpoints::local(&server.url()));
    let backend = IbmBackend::connect(&config).await.unwrap();

    assert_eq!(backend.client().channel(), Channel::IbmCloud);
    iam.assert_async().await;
    configuration.assert_async().await;
}

#[tokio::test]
async fn test_cloud_channel_requires_crn() {
    let server = Server::new_async().await;
    let config = IbmConfig::new("cloud-key")
        .with_channel(Channel::IbmCloud)
        .with_endpoints(Endpoints::local(&server.url()));
    let err = IbmBackend::connect(&config).await.unwrap_err();
    assert!(matches!(err, IbmError::MissingServiceCrn));
}

async fn connected(server: &mut ServerGuard) -> (IbmBackend, Mock) {
    let _login = mock_login(server).await;
    let _configuration = mock_configuration(server).await;
    let status = mock_status(server, true, "active").await;
    let backend = IbmBackend::connect(&config(server)).await.unwrap();
    (backend, status)
}

#[tokio::test]
async fn test_availability_follows_device_status() {
    let mut server = Server::new_async().await;
    let (backend, online) = connected(&mut server).await;

    let availability = backend.availability().await.unwrap();
    assert!(availability.is_available);
    assert_eq!(availability.queue_depth, Some(3));
    assert_eq!(availability.status_message.as_deref(), Some("active"));

    online.remove_async().await;
    let offline = mock_status(&mut server, false, "offline").await;
    let availability = backend.availability().await.unwrap();
    assert!(!availability.is_available);
    assert_eq!(availability.status_message.as_deref(), Some("offline"));

    offline.remove_async().await;
    let _failing = server
        .mock("GET", "/backends/fake_eagle/status")
        .with_status(500)
        .with_body("upstream error")
        .create_async()
        .await;
    let availability = backend.availability().await.unwrap();
    assert!(!availability.is_available);
    assert_eq!(
        availability.status_message.as_deref(),
        Some("failed to query backend")
    );
}

#[tokio::test]
async fn test_job_status_mapping_on_the_wire() {
    let mut server = Server::new_async().await;
    let (backend, _status) = connected(&mut server).await;

    let completed = server
        .mock("GET", "/jobs/job-1")
        .match_header("x-access-token", ACCESS)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "job-1", "status": "Completed" }).to_string())
        .create_async()
        .await;
    let _failed = server
        .mock("GET", "/jobs/job-2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "job-2",
                "status": "Failed",
                "state": { "status": "Failed", "reason": "Circuit exceeds T1" }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/jobs/job-3")
        .with_status(404)
        .create_async()
        .await;

    let status = backend.status(&JobId::new("job-1")).await.unwrap();
    assert_eq!(status, JobStatus::Completed);
    completed.assert_async().await;

    let status = backend.status(&JobId::new("job-2")).await.unwrap();
    assert_eq!(status, JobStatus::Failed("Circuit exceeds T1".into()));

    let err = backend.status(&JobId::new("job-3")).await.unwrap_err();
    assert!(matches!(err, HalError::JobNotFound(ref id) if id == "job-3"), "{err}");
}

#[tokio::test]
async fn test_cancel_job() {
    let mut server = Server::new_async().await;
    let (backend, _status) = connected(&mut server).await;

    let cancel = server
        .mock("POST", "/jobs/job-1/cancel")
        .match_header("x-access-token", ACCESS)
        .with_status(200)
        .create_async()
        .await;
    let _missing = server
        .mock("POST", "/jobs/job-9/cancel")
        .with_status(404)
        .create_async()
        .await;

    backend.cancel(&JobId::new("job-1")).await.unwrap();
    cancel.assert_async().await;

    let err = backend.cancel(&JobId::new("job-9")).await.unwrap_err();
    assert!(matches!(err, HalError::JobNotFound(ref id) if id == "job-9"), "{err}");
}
