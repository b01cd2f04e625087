//! Layout passes for mapping logical qubits to physical qubits.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use qpush_ir::{CircuitDag, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{CouplingMap, Layout, PropertySet};

/// Check the circuit fits and hand back the coupling map.
fn fitting_coupling_map<'a>(
    dag: &CircuitDag,
    properties: &'a PropertySet,
) -> CompileResult<&'a CouplingMap> {
    let coupling_map = properties
        .coupling_map
        .as_ref()
        .ok_or(CompileError::MissingCouplingMap)?;

    if dag.num_qubits() > coupling_map.num_qubits() as usize {
        return Err(CompileError::CircuitTooLarge {
            required: dag.num_qubits(),
            available: coupling_map.num_qubits(),
        });
    }
    Ok(coupling_map)
}

/// Maps the i-th logical qubit to physical qubit i.
pub struct TrivialLayout;

impl Pass for TrivialLayout {
    fn name(&self) -> &'static str {
        "TrivialLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    #[allow(clippy::cast_possible_truncation)]
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        fitting_coupling_map(dag, properties)?;

        let mut layout = Layout::new();
        for (i, logical) in dag.qubits().enumerate() {
            layout.add(logical, i as u32);
        }
        properties.layout = Some(layout);
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.layout.is_none()
    }
}

/// Places the circuit on the most densely connected region of the device.
///
/// From every physical qubit a region is grown breadth-first, always taking
/// the frontier qubit with the most links into the region. The region with
/// the most internal edges wins; logical qubits that take part in the most
/// two-qubit gates land on the region's best-connected qubits.
pub struct DenseLayout;

impl DenseLayout {
    fn grow_region(coupling_map: &CouplingMap, start: u32, size: usize) -> Option<Vec<u32>> {
        let mut region = vec![start];
        let mut members: FxHashSet<u32> = FxHashSet::from_iter([start]);

        while region.len() < size {
            let next = region
                .iter()
                .flat_map(|&q| coupling_map.neighbors(q))
                .filter(|q| !members.contains(q))
                .max_by_key(|&q| {
                    let links = coupling_map
                        .neighbors(q)
                        .filter(|n| members.contains(n))
                        .count();
                    // Prefer more links, then lower index.
                    (links, std::cmp::Reverse(q))
                })?;
            region.push(next);
            members.insert(next);
        }
        Some(region)
    }

    fn internal_edges(coupling_map: &CouplingMap, region: &[u32]) -> usize {
        let members: FxHashSet<u32> = region.iter().copied().collect();
        region
            .iter()
            .map(|&q| coupling_map.neighbors(q).filter(|n| members.contains(n)).count())
            .sum::<usize>()
            / 2
    }
}

impl Pass for DenseLayout {
    fn name(&self) -> &'static str {
        "DenseLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    #[allow(clippy::cast_possible_truncation)]
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = fitting_coupling_map(dag, properties)?;
        let size = dag.num_qubits();
        if size == 0 {
            properties.layout = Some(Layout::new());
            return Ok(());
        }

        // Strictly greater, so the lowest start wins ties.
        let mut best: Option<(usize, Vec<u32>)> = None;
        for start in 0..coupling_map.num_qubits() {
            let Some(region) = Self::grow_region(coupling_map, start, size) else {
                continue;
            };
            let score = Self::internal_edges(coupling_map, &region);
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, region));
            }
        }

        let Some((_, region)) = best else {
            debug!("No connected region of {size} qubits, falling back to trivial layout");
            return TrivialLayout.run(dag, properties);
        };

        let mut interactions: FxHashMap<QubitId, usize> = FxHashMap::default();
        for (_, inst) in dag.topological_ops() {
            if inst.is_gate() && inst.qubits.len() == 2 {
                for &q in &inst.qubits {
                    *interactions.entry(q).or_default() += 1;
                }
            }
        }
        let mut logical: Vec<QubitId> = dag.qubits().collect();
        logical.sort_by_key(|q| {
            (
                std::cmp::Reverse(interactions.get(q).copied().unwrap_or(0)),
                *q,
            )
        });

        let mut physical = region.clone();
        physical.sort_by_key(|&p| {
            let links = coupling_map
                .neighbors(p)
                .filter(|n| region.contains(n))
                .count();
            std::cmp::Reverse(links)
        });

        let mut layout = Layout::new();
        for (l, p) in logical.into_iter().zip(physical) {
            layout.add(l, p);
        }
        debug!("Dense layout region: {region:?}");
        properties.layout = Some(layout);
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.layout.is_none()
    }
}
