//! The compiled Bell circuit, run on a simulator that poses as an
//! Eagle-style device.

use std::sync::Arc;

use qpush_adapter_sim::SimulatorBackend;
use qpush_compile::{BasisGates, CouplingMap, Target, transpile};
use qpush_hal::{
    Backend, Capabilities, GateSet, HalError, Session, SessionOptions, Topology,
};
use qpush_ir::{Circuit, QubitId};

const EDGES: [(u32, u32); 4] = [(0, 1), (2, 1), (2, 3), (4, 3)];

fn device() -> Capabilities {
    Capabilities::ibm(
        "fake_eagle",
        5,
        GateSet::ibm_eagle(),
        Topology::directed(EDGES.to_vec()),
    )
}

fn target() -> Target {
    Target::new(
        "fake_eagle",
        CouplingMap::from_edges(5, EDGES),
        BasisGates::ibm_eagle(),
    )
}

fn assert_even_split(p: &std::collections::BTreeMap<String, f64>, a: &str, b: &str) {
    let total: f64 = p.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!((p[a] - 0.5).abs() < 1e-9, "{p:?}");
    assert!((p[b] - 0.5).abs() < 1e-9, "{p:?}");
}

#[test]
fn transpiled_bell_keeps_its_distribution() {
    let backend = SimulatorBackend::with_capabilities(device());
    for level in 0..=3 {
        let compiled = transpile(&Circuit::bell().unwrap(), &target(), level).unwrap();
        let p = backend.probabilities(&compiled).unwrap();
        assert_even_split(&p, "00", "11");
    }
}

#[test]
fn routed_ghz_keeps_its_distribution() {
    let mut ghz = Circuit::with_qreg("ghz", 3);
    ghz.h(QubitId(0))
        .unwrap()
        .cx(QubitId(0), QubitId(1))
        .unwrap()
        .cx(QubitId(0), QubitId(2))
        .unwrap()
        .measure_all()
        .unwrap();

    let backend = SimulatorBackend::with_capabilities(device());
    for level in 0..=3 {
        let compiled = transpile(&ghz, &target(), level).unwrap();
        let p = backend.probabilities(&compiled).unwrap();
        assert_even_split(&p, "000", "111");
    }
}

#[tokio::test]
async fn sampler_accepts_only_native_circuits() {
    let backend = Arc::new(SimulatorBackend::with_capabilities(device()).with_seed(42));
    let session = Session::open(backend.clone(), &SessionOptions::default())
        .await
        .unwrap();

    let err = session
        .sampler()
        .run(&Circuit::bell().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::InvalidCircuit(_)));

    let compiled = transpile(&Circuit::bell().unwrap(), &target(), 3).unwrap();
    let job = session.sampler().run(&compiled).await.unwrap();
    session.close().await.unwrap();

    let result = backend.result(&job).unwrap();
    assert_eq!(result.shots, 4096);
    assert_eq!(result.count("00") + result.count("11"), 4096);
    assert!(result.count("00").abs_diff(2048) < 200);
    assert_eq!(backend.open_sessions(), 0);
    assert!(backend.validate(&compiled).await.unwrap().is_valid());
}
