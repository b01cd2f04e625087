//! End-to-end runs of the `qpush` binary against a mock IBM Quantum API.
//!
//! Each test writes its own env file and points every endpoint at a local
//! mockito server, so nothing leaves the machine.

use std::io::Write;
use std::process::{Command, Output};

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use tempfile::NamedTempFile;

const BACKEND: &str = "ibm_brisbane";

/// Variables that would otherwise leak from the developer's shell.
const AMBIENT_VARS: [&str; 11] = [
    "IBM_API_TOKEN",
    "IBM_BACKEND",
    "IBM_CHANNEL",
    "IBM_INSTANCE",
    "IBM_SERVICE_CRN",
    "IBM_QUANTUM_AUTH_URL",
    "IBM_QUANTUM_API_URL",
    "IBM_IAM_URL",
    "QPUSH_SHOTS",
    "QPUSH_OPTIMIZATION_LEVEL",
    "QPUSH_ENV_FILE",
];

fn env_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn qpush(env: &NamedTempFile, base_url: &str, extra: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_qpush"));
    for var in AMBIENT_VARS {
        command.env_remove(var);
    }
    command
        .arg("--env-file")
        .arg(env.path())
        .args(["--auth-url", base_url, "--api-url", base_url])
        .args(extra)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn mock_login(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/users/loginWithToken")
        .match_body(Matcher::PartialJson(json!({ "apiToken": "tok" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "access-1" }).to_string())
        .create()
}

/// A five-qubit slice of an Eagle device.
fn mock_device(server: &mut ServerGuard, status: &str) -> (Mock, Mock) {
    let configuration = server
        .mock("GET", format!("/backends/{BACKEND}/configuration").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "backend_name": BACKEND,
                "n_qubits": 5,
                "basis_gates": ["ecr", "id", "rz", "sx", "x"],
                "coupling_map": [[1, 0], [1, 2], [3, 2], [3, 4]],
                "processor_type": {"family": "Eagle", "revision": 3},
                "simulator": false
            })
            .to_string(),
        )
        .create();
    let state = status != "offline";
    let status = server
        .mock("GET", format!("/backends/{BACKEND}/status").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "state": state, "status": status, "length_queue": 0 }).to_string())
        .create();
    (configuration, status)
}

fn mock_session(server: &mut ServerGuard) -> (Mock, Mock) {
    let open = server
        .mock("POST", "/sessions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "sess-1" }).to_string())
        .create();
    let close = server
        .mock("PATCH", "/sessions/sess-1")
        .match_body(Matcher::Json(json!({ "accepting_jobs": false })))
        .with_status(204)
        .create();
    (open, close)
}

#[test]
fn missing_token_fails_before_any_request() {
    let mut server = Server::new();
    let untouched = server.mock("POST", Matcher::Any).expect(0).create();
    let env = env_file("# no token here\nIBM_BACKEND=ibm_brisbane\n");

    let output = qpush(&env, &server.url(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout(&output),
        "Erreur: IBM_API_TOKEN manquant dans le fichier .env\n"
    );
    untouched.assert();
}

#[test]
fn unparsable_env_file_is_a_missing_token() {
    let mut server = Server::new();
    let untouched = server.mock("POST", Matcher::Any).expect(0).create();
    let env = env_file("not valid line\n");

    let output = qpush(&env, &server.url(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout(&output),
        "Erreur: IBM_API_TOKEN manquant dans le fichier .env\n"
    );
    untouched.assert();
}

#[test]
fn stray_env_line_does_not_stop_the_run() {
    let mut server = Server::new();
    let login = mock_login(&mut server);
    let _missing = server
        .mock("GET", format!("/backends/{BACKEND}/configuration").as_str())
        .with_status(404)
        .create();
    let env = env_file("IBM_API_TOKEN=tok\nnot valid line\n");

    let output = qpush(&env, &server.url(), &[]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.starts_with("Erreur de connexion à IBM Quantum: "), "{out}");
    login.assert();
}

#[test]
fn unreachable_service_is_a_connection_error() {
    let env = env_file("IBM_API_TOKEN=tok\n");
    // Port 9 (discard) has no listener on a test machine.
    let output = qpush(&env, "http://127.0.0.1:9", &[]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.starts_with("Erreur de connexion à IBM Quantum: "), "{out}");
    assert!(out.len() > "Erreur de connexion à IBM Quantum: \n".len());
}

#[test]
fn unknown_backend_is_a_connection_error() {
    let mut server = Server::new();
    let _login = mock_login(&mut server);
    let _missing = server
        .mock("GET", "/backends/ibm_atlantis/configuration")
        .with_status(404)
        .create();
    let env = env_file("IBM_API_TOKEN=tok\n");

    let output = qpush(&env, &server.url(), &["--backend", "ibm_atlantis"]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.starts_with("Erreur de connexion à IBM Quantum: "), "{out}");
    assert!(out.contains("ibm_atlantis"), "{out}");
}

#[test]
fn offline_backend_is_a_connection_error() {
    let mut server = Server::new();
    let _login = mock_login(&mut server);
    let _device = mock_device(&mut server, "offline");
    let sessions = server.mock("POST", "/sessions").expect(0).create();
    let env = env_file("IBM_API_TOKEN=tok\n");

    let output = qpush(&env, &server.url(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).starts_with("Erreur de connexion à IBM Quantum: "));
    sessions.assert();
}

#[test]
fn successful_run_prints_only_the_job_id() {
    let mut server = Server::new();
    let login = mock_login(&mut server);
    let _device = mock_device(&mut server, "active");
    let (open, close) = mock_session(&mut server);
    let job = server
        .mock("POST", "/jobs")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "program_id": "sampler",
                "backend": BACKEND,
                "session_id": "sess-1",
                "params": { "version": 2 }
            })),
            Matcher::Regex(r#"ecr q\[\d\], q\[\d\];"#.into()),
            Matcher::Regex(r#"\{\},4096\]\]"#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "d1a2b3c4", "backend": BACKEND }).to_string())
        .create();
    let env = env_file("IBM_API_TOKEN=tok\n");

    let output = qpush(&env, &server.url(), &[]);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(stdout(&output), "Job ID: d1a2b3c4\n");
    login.assert();
    open.assert();
    job.assert();
    close.assert();
}

#[test]
fn rejected_job_still_closes_the_session() {
    let mut server = Server::new();
    let _login = mock_login(&mut server);
    let _device = mock_device(&mut server, "active");
    let (_open, close) = mock_session(&mut server);
    let _job = server
        .mock("POST", "/jobs")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(json!({ "errors": [{ "code": 1234, "message": "Invalid pub" }] }).to_string())
        .create();
    let env = env_file("IBM_API_TOKEN=tok\n");

    let output = qpush(&env, &server.url(), &["--shots", "100"]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.starts_with("Erreur lors de l'exécution du circuit: "), "{out}");
    assert!(out.contains("Invalid pub"), "{out}");
    close.assert();
}

#[test]
fn dry_run_prints_qasm_without_a_session() {
    let mut server = Server::new();
    let _login = mock_login(&mut server);
    let _device = mock_device(&mut server, "active");
    let sessions = server.mock("POST", "/sessions").expect(0).create();
    let env = env_file("IBM_API_TOKEN=tok\n");

    let output = qpush(&env, &server.url(), &["--dry-run", "-O", "1"]);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let out = stdout(&output);
    assert!(out.starts_with("OPENQASM 3.0;\ninclude \"stdgates.inc\";\n"), "{out}");
    assert!(out.contains("ecr "), "{out}");
    assert!(!out.contains("cx "), "{out}");
    assert!(!out.contains("h q"), "{out}");
    sessions.assert();
}

#[test]
fn out_of_range_optimization_level_is_a_usage_error() {
    let env = env_file("IBM_API_TOKEN=tok\n");
    let output = qpush(&env, "http://127.0.0.1:9", &["--optimization-level", "4"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
