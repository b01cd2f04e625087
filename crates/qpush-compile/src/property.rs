//! `PropertySet` and related types for pass communication.
//!
//! Passes share state through a [`PropertySet`]: the target's coupling map
//! and basis gates go in before compilation, the layout pass fills in the
//! [`Layout`], and analysis passes can stash arbitrary typed results.
//!
//! # Examples
//!
//! ```
//! use qpush_compile::{BasisGates, CouplingMap, PropertySet};
//!
//! let props = PropertySet::new().with_target(
//!     CouplingMap::linear_directed(5),
//!     BasisGates::ibm_eagle(),
//! );
//!
//! let cm = props.coupling_map.as_ref().unwrap();
//! assert!(cm.supports(0, 1));
//! assert!(!cm.supports(1, 0));
//! assert!(cm.is_connected(1, 0));
//! assert!(props.basis_gates.as_ref().unwrap().contains("ecr"));
//! ```
//!
//! Custom properties are keyed by type:
//!
//! ```
//! use qpush_compile::PropertySet;
//!
//! #[derive(Debug, PartialEq)]
//! struct SwapCount(usize);
//!
//! let mut props = PropertySet::new();
//! props.insert(SwapCount(3));
//! assert_eq!(props.get::<SwapCount>(), Some(&SwapCount(3)));
//! ```

use std::any::{Any, TypeId};
use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use qpush_ir::QubitId;

/// A mapping from logical qubits to physical qubits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layout {
    logical_to_physical: FxHashMap<QubitId, u32>,
    physical_to_logical: FxHashMap<u32, QubitId>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical qubit i on physical qubit i.
    pub fn trivial(num_qubits: u32) -> Self {
        let mut layout = Self::new();
        for i in 0..num_qubits {
            layout.add(QubitId(i), i);
        }
        layout
    }

    /// Map `logical` onto `physical`, dropping any mapping either side
    /// previously had so the two directions stay consistent.
    pub fn add(&mut self, logical: QubitId, physical: u32) {
        if let Some(&old_logical) = self.physical_to_logical.get(&physical) {
            if old_logical != logical {
                self.logical_to_physical.remove(&old_logical);
            }
        }
        if let Some(&old_physical) = self.logical_to_physical.get(&logical) {
            if old_physical != physical {
                self.physical_to_logical.remove(&old_physical);
            }
        }
        self.logical_to_physical.insert(logical, physical);
        self.physical_to_logical.insert(physical, logical);
    }

    pub fn get_physical(&self, logical: QubitId) -> Option<u32> {
        self.logical_to_physical.get(&logical).copied()
    }

    pub fn get_logical(&self, physical: u32) -> Option<QubitId> {
        self.physical_to_logical.get(&physical).copied()
    }

    /// Exchange whatever sits on two physical qubits. Either side may be empty.
    pub fn swap(&mut self, p1: u32, p2: u32) {
        let l1 = self.physical_to_logical.remove(&p1);
        let l2 = self.physical_to_logical.remove(&p2);

        if let Some(l1) = l1 {
            self.logical_to_physical.insert(l1, p2);
            self.physical_to_logical.insert(p2, l1);
        }
        if let Some(l2) = l2 {
            self.logical_to_physical.insert(l2, p1);
            self.physical_to_logical.insert(p1, l2);
        }
    }

    pub fn len(&self) -> usize {
        self.logical_to_physical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logical_to_physical.is_empty()
    }

    /// (logical, physical) pairs sorted by logical qubit.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        let mut pairs: Vec<_> = self.logical_to_physical.iter().map(|(&l, &p)| (l, p)).collect();
        pairs.sort_unstable();
        pairs.into_iter()
    }
}

/// Target device coupling map.
///
/// Edges are directed: `(control, target)` means the device can run its
/// native two-qubit gate with `control` first. Connectivity for layout and
/// routing ignores direction; [`supports`](Self::supports) does not.
///
/// All-pairs BFS distances are precomputed by the constructors. After
/// deserialization, call [`rebuild_caches`](Self::rebuild_caches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingMap {
    /// Directed edges in insertion order.
    edges: Vec<(u32, u32)>,
    num_qubits: u32,
    #[serde(skip)]
    directed: FxHashSet<(u32, u32)>,
    /// Undirected neighbor lists.
    #[serde(skip)]
    adjacency: FxHashMap<u32, Vec<u32>>,
    /// `dist_matrix[from][to]`, or `u32::MAX` when unreachable.
    #[serde(skip)]
    dist_matrix: Vec<Vec<u32>>,
    /// `pred_matrix[from][to]` is the hop before `to` on a shortest path.
    #[serde(skip)]
    pred_matrix: Vec<Vec<u32>>,
}

impl CouplingMap {
    pub fn new(num_qubits: u32) -> Self {
        Self {
            edges: vec![],
            num_qubits,
            directed: FxHashSet::default(),
            adjacency: FxHashMap::default(),
            dist_matrix: vec![],
            pred_matrix: vec![],
        }
    }

    /// Build a map from directed `(control, target)` pairs.
    pub fn from_edges(num_qubits: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut map = Self::new(num_qubits);
        for (a, b) in edges {
            map.add_edge(a, b);
        }
        map.precompute_distances();
        map
    }

    /// Add a directed edge. Exact duplicates are ignored.
    ///
    /// Invalidates the distance cache; call
    /// [`rebuild_caches`](Self::rebuild_caches) when done editing.
    pub fn add_edge(&mut self, control: u32, target: u32) {
        if !self.directed.insert((control, target)) {
            return;
        }
        self.edges.push((control, target));
        self.link(control, target);
        self.dist_matrix.clear();
        self.pred_matrix.clear();
    }

    fn link(&mut self, a: u32, b: u32) {
        let fwd = self.adjacency.entry(a).or_default();
        if !fwd.contains(&b) {
            fwd.push(b);
        }
        let back = self.adjacency.entry(b).or_default();
        if !back.contains(&a) {
            back.push(a);
        }
    }

    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist_matrix = vec![vec![u32::MAX; n]; n];
        self.pred_matrix = vec![vec![u32::MAX; n]; n];

        for src in 0..n {
            self.dist_matrix[src][src] = 0;
            let mut queue = VecDeque::new();
            queue.push_back(src as u32);

            while let Some(current) = queue.pop_front() {
                let cur = current as usize;
                for &neighbor in self.adjacency.get(&current).into_iter().flatten() {
                    let nb = neighbor as usize;
                    if nb < n && self.dist_matrix[src][nb] == u32::MAX {
                        self.dist_matrix[src][nb] = self.dist_matrix[src][cur] + 1;
                        self.pred_matrix[src][nb] = current;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    /// Rebuild the lookup tables from the edge list.
    pub fn rebuild_caches(&mut self) {
        self.directed.clear();
        self.adjacency.clear();
        for (a, b) in self.edges.clone() {
            self.directed.insert((a, b));
            self.link(a, b);
        }
        self.precompute_distances();
    }

    /// Whether the two qubits share an edge in either direction.
    #[inline]
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(&q1)
            .is_some_and(|neighbors| neighbors.contains(&q2))
    }

    /// Whether the native two-qubit gate can run as `(control, target)`.
    #[inline]
    pub fn supports(&self, control: u32, target: u32) -> bool {
        self.directed.contains(&(control, target))
    }

    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Neighbors of a qubit in either direction.
    pub fn neighbors(&self, qubit: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency
            .get(&qubit)
            .map(|v| v.iter().copied())
            .into_iter()
            .flatten()
    }

    pub fn degree(&self, qubit: u32) -> usize {
        self.adjacency.get(&qubit).map_or(0, Vec::len)
    }

    /// Chain with edges in both directions.
    pub fn linear(n: u32) -> Self {
        Self::from_edges(n, (0..n.saturating_sub(1)).flat_map(|i| [(i, i + 1), (i + 1, i)]))
    }

    /// Chain where only `i -> i+1` is native.
    pub fn linear_directed(n: u32) -> Self {
        Self::from_edges(n, (0..n.saturating_sub(1)).map(|i| (i, i + 1)))
    }

    /// All-to-all, both directions.
    pub fn full(n: u32) -> Self {
        Self::from_edges(
            n,
            (0..n).flat_map(move |a| (0..n).filter(move |&b| b != a).map(move |b| (a, b))),
        )
    }

    /// Undirected shortest-path length.
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        let (f, t) = (from as usize, to as usize);
        if f < self.dist_matrix.len() && t < self.dist_matrix[f].len() {
            let d = self.dist_matrix[f][t];
            return (d != u32::MAX).then_some(d);
        }
        self.bfs_path(from, to).map(|p| (p.len() - 1) as u32)
    }

    /// Qubits on a shortest undirected path, both ends included.
    pub fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        if from == to {
            return Some(vec![from]);
        }

        let (f, t) = (from as usize, to as usize);
        if f >= self.pred_matrix.len() || t >= self.pred_matrix[f].len() {
            return self.bfs_path(from, to);
        }
        if self.dist_matrix[f][t] == u32::MAX {
            return None;
        }

        let mut path = vec![to];
        let mut current = to;
        while current != from {
            let pred = self.pred_matrix[f][current as usize];
            if pred == u32::MAX {
                return None;
            }
            path.push(pred);
            current = pred;
        }
        path.reverse();
        Some(path)
    }

    /// On-the-fly BFS for maps edited after construction.
    fn bfs_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        let mut pred: FxHashMap<u32, u32> = FxHashMap::default();
        let mut queue = VecDeque::from([from]);
        pred.insert(from, from);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while node != from {
                    node = pred[&node];
                    path.push(node);
                }
                path.reverse();
                return Some(path);
            }
            for neighbor in self.neighbors(current) {
                if let std::collections::hash_map::Entry::Vacant(e) = pred.entry(neighbor) {
                    e.insert(current);
                    queue.push_back(neighbor);
                }
            }
        }
        None
    }
}

/// Basis gates for the target device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisGates {
    gates: Vec<String>,
}

impl BasisGates {
    pub fn new(gates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            gates: gates.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn contains(&self, gate: &str) -> bool {
        self.gates.iter().any(|g| g == gate)
    }

    pub fn gates(&self) -> &[String] {
        &self.gates
    }

    /// IBM Eagle processors (e.g. `ibm_brisbane`): ECR entangler.
    pub fn ibm_eagle() -> Self {
        Self::new(["ecr", "id", "rz", "sx", "x"])
    }

    /// IBM Heron processors: CZ entangler.
    pub fn ibm_heron() -> Self {
        Self::new(["cz", "id", "rz", "sx", "x"])
    }

    /// Older IBM Falcon-style basis with CX.
    pub fn generic_cx() -> Self {
        Self::new(["cx", "id", "rz", "sx", "x"])
    }
}

/// Shared state for a compilation run.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Logical to physical mapping. Written by the layout pass.
    pub layout: Option<Layout>,

    /// Target connectivity. Required by layout and routing.
    pub coupling_map: Option<CouplingMap>,

    /// Target gate set. Required by translation.
    pub basis_gates: Option<BasisGates>,

    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_target(mut self, coupling_map: CouplingMap, basis_gates: BasisGates) -> Self {
        self.coupling_map = Some(coupling_map);
        self.basis_gates = Some(basis_gates);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_swap_with_empty_side() {
        let mut layout = Layout::trivial(2);
        layout.swap(1, 5);
        assert_eq!(layout.get_physical(QubitId(1)), Some(5));
        assert_eq!(layout.get_logical(5), Some(QubitId(1)));
        assert_eq!(layout.get_logical(1), None);
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn test_layout_add_replaces_conflicts() {
        let mut layout = Layout::trivial(2);
        layout.add(QubitId(0), 1);
        assert_eq!(layout.get_physical(QubitId(0)), Some(1));
        assert_eq!(layout.get_physical(QubitId(1)), None);
        assert_eq!(layout.get_logical(0), None);
    }

    #[test]
    fn test_directed_edges() {
        let cm = CouplingMap::from_edges(3, [(1, 0), (1, 2)]);
        assert!(cm.supports(1, 0));
        assert!(!cm.supports(0, 1));
        assert!(cm.is_connected(0, 1));
        assert_eq!(cm.degree(1), 2);
        assert_eq!(cm.distance(0, 2), Some(2));
        assert_eq!(cm.shortest_path(0, 2), Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_linear_is_bidirectional() {
        let cm = CouplingMap::linear(4);
        assert!(cm.supports(2, 1));
        assert!(cm.supports(1, 2));
        assert!(!cm.is_connected(0, 2));
        assert_eq!(cm.edges().len(), 6);
    }

    #[test]
    fn test_edits_fall_back_to_bfs() {
        let mut cm = CouplingMap::new(4);
        cm.add_edge(0, 1);
        cm.add_edge(1, 2);
        cm.add_edge(2, 3);
        assert_eq!(cm.distance(0, 3), Some(3));
        assert_eq!(cm.shortest_path(3, 0), Some(vec![3, 2, 1, 0]));
        cm.rebuild_caches();
        assert_eq!(cm.distance(0, 3), Some(3));
    }

    #[test]
    fn test_disconnected() {
        let cm = CouplingMap::from_edges(4, [(0, 1), (2, 3)]);
        assert_eq!(cm.distance(0, 3), None);
        assert_eq!(cm.shortest_path(0, 3), None);
    }

    #[test]
    fn test_basis_presets() {
        assert!(BasisGates::ibm_eagle().contains("ecr"));
        assert!(!BasisGates::ibm_eagle().contains("cx"));
        assert!(BasisGates::ibm_heron().contains("cz"));
        assert!(BasisGates::generic_cx().contains("cx"));
    }

    #[test]
    fn test_property_set_custom() {
        #[derive(Debug, PartialEq)]
        struct Marker(u8);

        let mut props = PropertySet::new();
        props.insert(Marker(1));
        props.get_mut::<Marker>().unwrap().0 = 2;
        assert_eq!(props.remove::<Marker>(), Some(Marker(2)));
        assert!(props.get::<Marker>().is_none());
    }
}
