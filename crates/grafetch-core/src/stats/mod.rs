//! # Statistics Reporter
//!
//! Descriptive metrics of a finished graph.
//!
//! One pass over the adjacency collects degrees, self-loops and the
//! union-find forest; everything in [`GraphReport`] derives from that pass.
//!
//! - Density excludes self-loops; `0.0` below two nodes
//! - Components are weakly connected for directed graphs
//! - Median is the lower middle of the sorted degrees
//! - Mode ties go to the smallest degree
//! - Top-k ties go to the lexicographically smallest name

mod report;

pub use report::{CentralNode, GraphReport};

use crate::builder::BuildSummary;
use crate::graph::GraphSurface;
use crate::primitives::DEFAULT_TOP_K;
use crate::{NodeId, NodeIndex};
use std::collections::BTreeMap;

/// Computes [`GraphReport`]s for any [`GraphSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsReporter {
    top_k: usize,
}

impl Default for StatisticsReporter {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl StatisticsReporter {
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Report on `graph`. `summary` contributes the build anomaly counters.
    pub fn report<G: GraphSurface + ?Sized>(
        &self,
        name: &str,
        graph: &G,
        summary: &BuildSummary,
    ) -> GraphReport {
        let n = graph.node_count();
        let directed = graph.is_directed();

        let mut degrees = Vec::with_capacity(n);
        let mut self_loops = 0usize;
        let mut forest = UnionFind::new(n);
        for i in 0..n {
            let node = NodeIndex(i as u32);
            degrees.push(graph.degree(node));
            for (neighbor, _) in graph.neighbors(node) {
                if neighbor == node {
                    self_loops += 1;
                } else {
                    forest.union(i, neighbor.as_usize());
                }
            }
        }
        let (connected_component_count, largest_component_size, smallest_component_size) =
            forest.component_sizes();
        let (median_degree, mean_degree, modal_degree) = degree_statistics(&degrees);

        GraphReport {
            name: name.to_string(),
            directed,
            node_count: n,
            edge_count: graph.edge_count(),
            self_loop_count: self_loops,
            duplicate_count: summary.duplicate_count,
            malformed_lines: summary.malformed_lines,
            weighted: summary.weighted,
            density: density(n, graph.edge_count().saturating_sub(self_loops), directed),
            connected_component_count,
            largest_component_size,
            smallest_component_size,
            median_degree,
            mean_degree,
            modal_degree,
            top_k_central_nodes: self.top_central(graph, &degrees),
        }
    }

    fn top_central<G: GraphSurface + ?Sized>(&self, graph: &G, degrees: &[usize]) -> Vec<CentralNode> {
        let mut ranked: Vec<(usize, NodeId)> = degrees
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let node = NodeIndex(i as u32);
                let id = graph
                    .node_name(node)
                    .cloned()
                    .unwrap_or_else(|| NodeId::new(i.to_string()));
                (d, id)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked
            .into_iter()
            .take(self.top_k)
            .map(|(degree, id)| CentralNode { id, degree })
            .collect()
    }
}

/// Edges over possible edges, self-loops excluded.
#[allow(clippy::float_arithmetic)]
fn density(nodes: usize, proper_edges: usize, directed: bool) -> f64 {
    if nodes < 2 {
        return 0.0;
    }
    let n = nodes as f64;
    let possible = if directed {
        n * (n - 1.0)
    } else {
        n * (n - 1.0) / 2.0
    };
    proper_edges as f64 / possible
}

/// `(median, mean, mode)` of the degree multiset; zeros when empty.
#[allow(clippy::float_arithmetic)]
fn degree_statistics(degrees: &[usize]) -> (usize, f64, usize) {
    if degrees.is_empty() {
        return (0, 0.0, 0);
    }
    let mut sorted = degrees.to_vec();
    sorted.sort_unstable();
    let median = sorted[(sorted.len() - 1) / 2];

    let total: usize = sorted.iter().sum();
    let mean = total as f64 / sorted.len() as f64;

    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &d in &sorted {
        *counts.entry(d).or_insert(0) += 1;
    }
    let mut mode = 0;
    let mut best = 0;
    for (&degree, &count) in &counts {
        if count > best {
            best = count;
            mode = degree;
        }
    }
    (median, mean, mode)
}

// =============================================================================
// UNION-FIND
// =============================================================================

/// Disjoint sets with path halving and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }

    /// `(count, largest, smallest)` over all components.
    fn component_sizes(&mut self) -> (usize, usize, usize) {
        let mut count = 0;
        let mut largest = 0;
        let mut smallest = usize::MAX;
        for x in 0..self.parent.len() {
            if self.find(x) == x {
                count += 1;
                largest = largest.max(self.size[x]);
                smallest = smallest.min(self.size[x]);
            }
        }
        if count == 0 {
            smallest = 0;
        }
        (count, largest, smallest)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdgeRecord, Graph, GraphBuilder};

    fn build(directed: bool, edges: &[(&str, &str)]) -> Graph {
        GraphBuilder::new(directed)
            .build(
                edges
                    .iter()
                    .map(|(s, d)| Ok(EdgeRecord::new(*s, *d, None)))
                    .collect::<Vec<_>>(),
            )
            .expect("build")
    }

    fn report(graph: &Graph) -> GraphReport {
        StatisticsReporter::default().report("Fixture", graph, graph.summary())
    }

    #[test]
    fn complete_graph_has_density_one() {
        let g = build(
            false,
            &[("a", "b"), ("a", "c"), ("a", "d"), ("b", "c"), ("b", "d"), ("c", "d")],
        );
        let r = report(&g);
        assert_eq!(r.density, 1.0);
        assert_eq!(r.connected_component_count, 1);
        assert_eq!(r.median_degree, 3);
        assert_eq!(r.modal_degree, 3);
    }

    #[test]
    fn empty_graph_reports_zeros() {
        let r = report(&build(false, &[]));
        assert_eq!(r.density, 0.0);
        assert_eq!(r.connected_component_count, 0);
        assert_eq!(r.largest_component_size, 0);
        assert_eq!(r.smallest_component_size, 0);
        assert!(r.top_k_central_nodes.is_empty());
    }

    #[test]
    fn components_and_sizes() {
        let g = build(false, &[("a", "b"), ("b", "c"), ("x", "y")]);
        let r = report(&g);
        assert_eq!(r.connected_component_count, 2);
        assert_eq!(r.largest_component_size, 3);
        assert_eq!(r.smallest_component_size, 2);
    }

    #[test]
    fn directed_components_are_weak() {
        let g = build(true, &[("a", "b"), ("c", "b")]);
        let r = report(&g);
        assert_eq!(r.connected_component_count, 1);
        assert_eq!(r.density, 0.333_333_333_333_333_3);
    }

    #[test]
    fn self_loops_excluded_from_density() {
        let g = build(false, &[("a", "a"), ("a", "b")]);
        let r = report(&g);
        assert_eq!(r.self_loop_count, 1);
        assert_eq!(r.density, 1.0);
        assert_eq!(r.top_k_central_nodes[0].degree, 2);
    }

    #[test]
    fn degree_statistics_tie_breaks() {
        // degrees: a=1, b=2, c=2, d=1 -> mode tie 1 vs 2 goes to 1
        let g = build(false, &[("a", "b"), ("b", "c"), ("c", "d")]);
        let r = report(&g);
        assert_eq!(r.modal_degree, 1);
        assert_eq!(r.median_degree, 1);
        assert_eq!(r.mean_degree, 1.5);

        let top: Vec<&str> = r.top_k_central_nodes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(top, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn top_k_is_truncated() {
        let g = build(false, &[("a", "b"), ("b", "c"), ("c", "d")]);
        let r = StatisticsReporter::new(1).report("Fixture", &g, g.summary());
        assert_eq!(r.top_k_central_nodes.len(), 1);
        assert_eq!(r.top_k_central_nodes[0].id.as_str(), "b");
    }
}
