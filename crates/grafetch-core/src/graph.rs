//! # Graph
//!
//! The immutable graph handed back by a retrieval.
//!
//! Storage is compressed sparse row (CSR): `offsets[i]..offsets[i + 1]`
//! indexes the neighbors of node `i` in `targets`/`weights`, sorted by
//! neighbor index. Undirected edges are stored in both endpoint rows and
//! counted once; a self-loop occupies a single slot.
//!
//! The read surface downstream code relies on is the [`GraphSurface`]
//! trait; [`GraphEngine`] turns a built [`Graph`] into whatever object a
//! caller's graph library wants.

use crate::builder::BuildSummary;
use crate::{GraphError, NodeId, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// GRAPH SURFACE TRAIT
// =============================================================================

/// The minimal read surface of a retrieved graph.
pub trait GraphSurface {
    fn is_directed(&self) -> bool;

    fn node_count(&self) -> usize;

    /// Number of edges; each undirected edge counts once.
    fn edge_count(&self) -> usize;

    /// Neighbors of `node` with edge weights, by ascending index.
    /// Outgoing neighbors for directed graphs. Empty for unknown nodes.
    fn neighbors(&self, node: NodeIndex) -> Vec<(NodeIndex, f64)>;

    fn node_name(&self, node: NodeIndex) -> Option<&NodeId>;

    fn node_index(&self, name: &str) -> Option<NodeIndex>;

    /// Distinct neighbors (undirected) or out-degree (directed).
    fn degree(&self, node: NodeIndex) -> usize;

    /// Split the edges into `(train, test)` graphs over the same node set.
    fn holdout(&self, train_fraction: f64, seed: u64) -> Result<(Self, Self), GraphError>
    where
        Self: Sized;
}

/// Assembles the caller-facing graph object from a built [`Graph`].
pub trait GraphEngine {
    type Output: GraphSurface;

    fn assemble(&self, graph: Graph) -> Result<Self::Output, GraphError>;
}

/// Engine that hands the CSR [`Graph`] back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrEngine;

impl GraphEngine for CsrEngine {
    type Output = Graph;

    fn assemble(&self, graph: Graph) -> Result<Graph, GraphError> {
        Ok(graph)
    }
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// CSR graph with a frozen name lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    directed: bool,
    /// Index -> external name.
    names: Vec<NodeId>,
    /// External name -> index. Never mutated after construction.
    index: BTreeMap<NodeId, NodeIndex>,
    offsets: Vec<usize>,
    targets: Vec<u32>,
    weights: Vec<f64>,
    edge_count: usize,
    self_loop_count: usize,
    summary: BuildSummary,
}

fn inconsistent(reason: impl Into<String>) -> GraphError {
    GraphError::Serialization(format!("inconsistent graph data: {}", reason.into()))
}

impl Graph {
    /// Build the CSR layout from canonical edges: each undirected edge
    /// appears once, in either orientation.
    pub(crate) fn from_edge_list(
        directed: bool,
        names: Vec<NodeId>,
        edges: &[(u32, u32, f64)],
        summary: BuildSummary,
    ) -> Result<Self, GraphError> {
        let n = names.len();
        if u32::try_from(n).is_err() {
            return Err(inconsistent(format!("{n} nodes exceed the u32 index space")));
        }

        let mut index = BTreeMap::new();
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), NodeIndex(i as u32)).is_some() {
                return Err(inconsistent(format!("duplicate node name '{name}'")));
            }
        }

        let mut arcs: Vec<(u32, u32, f64)> = Vec::with_capacity(edges.len() * 2);
        let mut self_loop_count = 0;
        for &(src, dst, w) in edges {
            if src as usize >= n || dst as usize >= n {
                return Err(inconsistent(format!("edge ({src}, {dst}) out of range")));
            }
            arcs.push((src, dst, w));
            if src == dst {
                self_loop_count += 1;
            } else if !directed {
                arcs.push((dst, src, w));
            }
        }
        arcs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        if let Some(pair) = arcs.windows(2).find(|p| (p[0].0, p[0].1) == (p[1].0, p[1].1)) {
            return Err(inconsistent(format!(
                "parallel edge ({}, {})",
                pair[0].0, pair[0].1
            )));
        }

        let mut offsets = vec![0usize; n + 1];
        for &(src, _, _) in &arcs {
            offsets[src as usize + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        Ok(Self {
            directed,
            names,
            index,
            offsets,
            targets: arcs.iter().map(|a| a.1).collect(),
            weights: arcs.iter().map(|a| a.2).collect(),
            edge_count: edges.len(),
            self_loop_count,
            summary,
        })
    }

    /// Neighbor slice bounds of `node`, if it exists.
    fn row(&self, node: NodeIndex) -> Option<(usize, usize)> {
        let i = node.as_usize();
        if i >= self.names.len() {
            return None;
        }
        Some((self.offsets[i], self.offsets[i + 1]))
    }

    /// Get neighbors (internal, iterator version for efficiency in algorithms).
    pub fn neighbors_internal(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, f64)> + '_ {
        let (start, end) = self.row(node).unwrap_or((0, 0));
        self.targets[start..end]
            .iter()
            .zip(&self.weights[start..end])
            .map(|(&t, &w)| (NodeIndex(t), w))
    }

    /// Weight of the edge `from -> to` (either orientation if undirected).
    #[must_use]
    pub fn edge_weight(&self, from: NodeIndex, to: NodeIndex) -> Option<f64> {
        let (start, end) = self.row(from)?;
        let pos = self.targets[start..end].binary_search(&to.0).ok()?;
        Some(self.weights[start + pos])
    }

    /// Canonical edges in index order; undirected edges once with `src <= dst`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, f64)> + '_ {
        (0..self.names.len()).flat_map(move |i| {
            let src = NodeIndex(i as u32);
            self.neighbors_internal(src)
                .filter(move |(dst, _)| self.directed || src <= *dst)
                .map(move |(dst, w)| (src, dst, w))
        })
    }

    /// External names in index order.
    #[must_use]
    pub fn names(&self) -> &[NodeId] {
        &self.names
    }

    #[must_use]
    pub fn self_loop_count(&self) -> usize {
        self.self_loop_count
    }

    /// Whether any input record carried an explicit weight.
    #[must_use]
    pub fn is_weighted(&self) -> bool {
        self.summary.weighted
    }

    /// Anomalies counted while building.
    #[must_use]
    pub fn summary(&self) -> &BuildSummary {
        &self.summary
    }

    fn canonical_edges(&self) -> Vec<(u32, u32, f64)> {
        self.edges().map(|(s, d, w)| (s.0, d.0, w)).collect()
    }
}

impl GraphSurface for Graph {
    fn is_directed(&self) -> bool {
        self.directed
    }

    fn node_count(&self) -> usize {
        self.names.len()
    }

    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn neighbors(&self, node: NodeIndex) -> Vec<(NodeIndex, f64)> {
        self.neighbors_internal(node).collect()
    }

    fn node_name(&self, node: NodeIndex) -> Option<&NodeId> {
        self.names.get(node.as_usize())
    }

    fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    fn degree(&self, node: NodeIndex) -> usize {
        self.row(node).map_or(0, |(start, end)| end - start)
    }

    /// Seeded random edge split. The same seed always yields the same
    /// split; no connectivity guarantee is made for either side.
    #[allow(clippy::float_arithmetic)]
    fn holdout(&self, train_fraction: f64, seed: u64) -> Result<(Self, Self), GraphError> {
        if !(0.0..=1.0).contains(&train_fraction) {
            return Err(GraphError::Config(format!(
                "train_fraction must be within [0, 1], got {train_fraction}"
            )));
        }

        let mut rng = SplitMix64(seed);
        let (train, test): (Vec<_>, Vec<_>) = self
            .canonical_edges()
            .into_iter()
            .partition(|_| rng.next_unit() < train_fraction);

        // Each half describes its own edges, not the parent's parse.
        let build = |edges: &[(u32, u32, f64)]| {
            let summary = BuildSummary {
                records: edges.len() as u64,
                self_loop_count: edges.iter().filter(|(s, d, _)| s == d).count() as u64,
                weighted: self.summary.weighted,
                ..BuildSummary::default()
            };
            Graph::from_edge_list(self.directed, self.names.clone(), edges, summary)
        };
        Ok((build(&train)?, build(&test)?))
    }
}

/// Small deterministic generator for holdout splits.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    #[allow(clippy::float_arithmetic)]
    fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable form of a [`Graph`] used by snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub directed: bool,
    pub names: Vec<NodeId>,
    pub edges: Vec<(u32, u32, f64)>,
    pub summary: BuildSummary,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        Self {
            directed: graph.directed,
            names: graph.names.clone(),
            edges: graph.canonical_edges(),
            summary: graph.summary.clone(),
        }
    }
}

impl TryFrom<SerializableGraph> for Graph {
    type Error = GraphError;

    fn try_from(sg: SerializableGraph) -> Result<Self, GraphError> {
        Graph::from_edge_list(sg.directed, sg.names, &sg.edges, sg.summary)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EdgeRecord;
    use crate::builder::GraphBuilder;

    fn names(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|s| NodeId::new(*s)).collect()
    }

    fn triangle(directed: bool) -> Graph {
        Graph::from_edge_list(
            directed,
            names(&["a", "b", "c"]),
            &[(0, 1, 1.0), (1, 2, 2.0), (2, 0, 3.0)],
            BuildSummary::default(),
        )
        .expect("build")
    }

    #[test]
    fn undirected_edges_seen_from_both_ends() {
        let g = triangle(false);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.degree(NodeIndex(0)), 2);
        assert_eq!(g.edge_weight(NodeIndex(0), NodeIndex(2)), Some(3.0));
        assert_eq!(g.edge_weight(NodeIndex(2), NodeIndex(0)), Some(3.0));
        assert_eq!(
            g.neighbors(NodeIndex(1)),
            vec![(NodeIndex(0), 1.0), (NodeIndex(2), 2.0)]
        );
    }

    #[test]
    fn directed_edges_are_outgoing_only() {
        let g = triangle(true);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.degree(NodeIndex(0)), 1);
        assert_eq!(g.edge_weight(NodeIndex(1), NodeIndex(0)), None);
    }

    #[test]
    fn self_loop_occupies_one_slot() {
        let g = Graph::from_edge_list(
            false,
            names(&["a", "b"]),
            &[(0, 0, 1.0), (0, 1, 1.0)],
            BuildSummary::default(),
        )
        .expect("build");
        assert_eq!(g.degree(NodeIndex(0)), 2);
        assert_eq!(g.self_loop_count(), 1);
        assert_eq!(g.edges().count(), 2);
    }

    #[test]
    fn name_lookup_is_frozen() {
        let g = triangle(false);
        assert_eq!(g.node_index("b"), Some(NodeIndex(1)));
        assert_eq!(g.node_name(NodeIndex(2)).map(NodeId::as_str), Some("c"));
        assert_eq!(g.node_index("zzz"), None);
        assert!(g.neighbors(NodeIndex(9)).is_empty());
    }

    #[test]
    fn parallel_edges_rejected() {
        let result = Graph::from_edge_list(
            false,
            names(&["a", "b"]),
            &[(0, 1, 1.0), (1, 0, 1.0)],
            BuildSummary::default(),
        );
        assert!(matches!(result, Err(GraphError::Serialization(_))));
    }

    #[test]
    fn serializable_roundtrip() {
        let g = triangle(false);
        let restored = Graph::try_from(SerializableGraph::from(&g)).expect("restore");
        assert_eq!(restored, g);
    }

    #[test]
    fn holdout_is_deterministic_and_partitions_edges() {
        let g = triangle(false);
        let (train_a, test_a) = g.holdout(0.5, 42).expect("split");
        let (train_b, test_b) = g.holdout(0.5, 42).expect("split");

        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.edge_count() + test_a.edge_count(), g.edge_count());
        assert_eq!(train_a.node_count(), g.node_count());

        let (all, none) = g.holdout(1.0, 7).expect("split");
        assert_eq!(all.edge_count(), 3);
        assert_eq!(none.edge_count(), 0);
    }

    #[test]
    fn holdout_halves_carry_their_own_summary() {
        let g = GraphBuilder::new(false)
            .build(
                [("a", "b"), ("b", "a"), ("b", "c"), ("c", "c")]
                    .iter()
                    .map(|(s, d)| Ok(EdgeRecord::new(*s, *d, Some(2.0))))
                    .collect::<Vec<_>>(),
            )
            .expect("build");
        assert_eq!(g.summary().duplicate_count, 1);

        let (train, test) = g.holdout(0.5, 3).expect("split");
        for half in [&train, &test] {
            assert_eq!(half.summary().records, half.edge_count() as u64);
            assert_eq!(half.summary().duplicate_count, 0);
            assert_eq!(half.summary().self_loop_count, half.self_loop_count() as u64);
            assert!(half.summary().weighted);
        }
        assert_eq!(train.summary().records + test.summary().records, 3);
    }

    #[test]
    fn holdout_rejects_bad_fraction() {
        assert!(matches!(
            triangle(false).holdout(1.5, 1),
            Err(GraphError::Config(_))
        ));
    }
}
