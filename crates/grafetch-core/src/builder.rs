//! # Graph Builder
//!
//! Edge-record validation and graph assembly.
//!
//! - Assign dense node indices in first-seen order
//! - Merge duplicate edges, keeping the first-seen weight
//! - Count self-loops, or reject them when strict
//! - No reordering: records are consumed in stream order

use crate::graph::Graph;
use crate::parser::EdgeStream;
use crate::primitives::CANCEL_CHECK_INTERVAL;
use crate::{CancellationToken, EdgeRecord, GraphError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// BUILD SUMMARY
// =============================================================================

/// Anomalies met while building, surfaced instead of raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Edge records consumed.
    pub records: u64,
    /// Lines skipped as malformed by a lenient parser.
    pub malformed_lines: u64,
    /// Header lines skipped by the parser.
    pub header_skipped: u64,
    /// Records merged into an existing edge.
    pub duplicate_count: u64,
    /// Distinct self-loop edges kept in the graph.
    pub self_loop_count: u64,
    /// Whether any record carried an explicit weight.
    pub weighted: bool,
}

impl BuildSummary {
    /// Whether the build met no anomaly at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.malformed_lines == 0 && self.duplicate_count == 0 && self.self_loop_count == 0
    }
}

// =============================================================================
// GRAPH BUILDER
// =============================================================================

/// Consumes edge records and produces an immutable [`Graph`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    directed: bool,
    strict_self_loops: bool,
    load_weights: bool,
    cancel: CancellationToken,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            strict_self_loops: false,
            load_weights: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Raise [`GraphError::UnexpectedSelfLoop`] instead of counting self-loops.
    #[must_use]
    pub fn strict_self_loops(mut self, strict: bool) -> Self {
        self.strict_self_loops = strict;
        self
    }

    /// Keep parsed weights. When off, every edge gets the default weight
    /// and the summary reports the graph as unweighted.
    #[must_use]
    pub fn load_weights(mut self, load: bool) -> Self {
        self.load_weights = load;
        self
    }

    /// Honour `cancel` every [`CANCEL_CHECK_INTERVAL`] records.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build from any record sequence. The first error aborts the build.
    pub fn build<I>(&self, records: I) -> Result<Graph, GraphError>
    where
        I: IntoIterator<Item = Result<EdgeRecord, GraphError>>,
    {
        let mut state = BuildState::default();
        for record in records {
            state.push(self.prepare(record?), self.directed, self.strict_self_loops)?;
            if state.summary.records % CANCEL_CHECK_INTERVAL == 0 {
                self.cancel.check()?;
            }
        }
        state.finish(self.directed)
    }

    /// Build from a parser stream, folding its counters into the summary.
    pub fn build_stream(&self, mut stream: EdgeStream) -> Result<Graph, GraphError> {
        let mut state = BuildState::default();
        for record in stream.by_ref() {
            state.push(self.prepare(record?), self.directed, self.strict_self_loops)?;
            if state.summary.records % CANCEL_CHECK_INTERVAL == 0 {
                self.cancel.check()?;
            }
        }
        let stats = stream.stats();
        state.summary.malformed_lines = stats.malformed_lines;
        state.summary.header_skipped = stats.header_skipped;
        state.finish(self.directed)
    }

    fn prepare(&self, mut record: EdgeRecord) -> EdgeRecord {
        if !self.load_weights {
            record.weight = None;
        }
        record
    }
}

#[derive(Default)]
struct BuildState {
    names: Vec<NodeId>,
    index: BTreeMap<NodeId, u32>,
    /// Key is `(src, dst)`; undirected keys are normalised to `src <= dst`.
    edges: BTreeMap<(u32, u32), f64>,
    summary: BuildSummary,
}

impl BuildState {
    fn intern(&mut self, id: NodeId) -> Result<u32, GraphError> {
        if let Some(&idx) = self.index.get(&id) {
            return Ok(idx);
        }
        let idx = u32::try_from(self.names.len())
            .map_err(|_| GraphError::Config("node count exceeds u32 index space".to_string()))?;
        self.names.push(id.clone());
        self.index.insert(id, idx);
        Ok(idx)
    }

    fn push(
        &mut self,
        record: EdgeRecord,
        directed: bool,
        strict_self_loops: bool,
    ) -> Result<(), GraphError> {
        self.summary.records += 1;
        if record.is_self_loop() && strict_self_loops {
            return Err(GraphError::UnexpectedSelfLoop(record.source));
        }

        let weight = record.weight_or_default();
        self.summary.weighted |= record.weight.is_some();
        let src = self.intern(record.source)?;
        let dst = self.intern(record.destination)?;
        let key = if directed || src <= dst {
            (src, dst)
        } else {
            (dst, src)
        };

        match self.edges.entry(key) {
            std::collections::btree_map::Entry::Occupied(_) => {
                self.summary.duplicate_count += 1;
            }
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(weight);
                if src == dst {
                    self.summary.self_loop_count += 1;
                }
            }
        }
        Ok(())
    }

    fn finish(self, directed: bool) -> Result<Graph, GraphError> {
        let edges: Vec<(u32, u32, f64)> = self
            .edges
            .into_iter()
            .map(|((s, d), w)| (s, d, w))
            .collect();

        tracing::info!(
            nodes = self.names.len(),
            edges = edges.len(),
            directed,
            duplicates = self.summary.duplicate_count,
            self_loops = self.summary.self_loop_count,
            malformed = self.summary.malformed_lines,
            "graph built"
        );
        if self.summary.self_loop_count > 0 {
            tracing::warn!(
                self_loops = self.summary.self_loop_count,
                "graph contains self-loops"
            );
        }

        Graph::from_edge_list(directed, self.names, &edges, self.summary)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphSurface;
    use crate::{NodeIndex, ParseMode};
    use std::io::Cursor;

    fn ok(records: &[(&str, &str, Option<f64>)]) -> Vec<Result<EdgeRecord, GraphError>> {
        records
            .iter()
            .map(|(s, d, w)| Ok(EdgeRecord::new(*s, *d, *w)))
            .collect()
    }

    #[test]
    fn indices_follow_first_appearance() {
        let g = GraphBuilder::new(false)
            .build(ok(&[("c", "a", None), ("a", "b", None)]))
            .expect("build");
        assert_eq!(g.node_index("c"), Some(NodeIndex(0)));
        assert_eq!(g.node_index("a"), Some(NodeIndex(1)));
        assert_eq!(g.node_index("b"), Some(NodeIndex(2)));
    }

    #[test]
    fn reverse_duplicate_is_merged_undirected() {
        let g = GraphBuilder::new(false)
            .build(ok(&[("A", "B", Some(3.0)), ("B", "A", Some(9.0))]))
            .expect("build");
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.summary().duplicate_count, 1);
        let (a, b) = (NodeIndex(0), NodeIndex(1));
        assert_eq!(g.edge_weight(a, b), Some(3.0));
        assert_eq!(g.edge_weight(b, a), Some(3.0));
    }

    #[test]
    fn reverse_pair_is_two_edges_directed() {
        let g = GraphBuilder::new(true)
            .build(ok(&[("A", "B", None), ("B", "A", None), ("A", "B", None)]))
            .expect("build");
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.summary().duplicate_count, 1);
    }

    #[test]
    fn self_loop_counted_when_lenient() {
        let g = GraphBuilder::new(false)
            .build(ok(&[("A", "A", Some(1.0)), ("A", "B", None)]))
            .expect("build");
        assert_eq!(g.summary().self_loop_count, 1);
        assert_eq!(g.self_loop_count(), 1);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn self_loop_rejected_when_strict() {
        let result = GraphBuilder::new(false)
            .strict_self_loops(true)
            .build(ok(&[("A", "B", None), ("A", "A", Some(1.0))]));
        assert!(matches!(
            result,
            Err(GraphError::UnexpectedSelfLoop(id)) if id.as_str() == "A"
        ));
    }

    #[test]
    fn weighted_flag_tracks_weights() {
        let unweighted = GraphBuilder::new(false)
            .build(ok(&[("A", "B", None)]))
            .expect("build");
        assert!(!unweighted.is_weighted());
        assert_eq!(unweighted.edge_weight(NodeIndex(0), NodeIndex(1)), Some(1.0));
    }

    #[test]
    fn disabled_weights_fall_back_to_default() {
        let g = GraphBuilder::new(false)
            .load_weights(false)
            .build(ok(&[("A", "B", Some(7.0)), ("B", "C", Some(2.5))]))
            .expect("build");
        assert!(!g.is_weighted());
        assert!(!g.summary().weighted);
        assert_eq!(g.edge_weight(NodeIndex(0), NodeIndex(1)), Some(1.0));
        assert_eq!(g.edge_weight(NodeIndex(1), NodeIndex(2)), Some(1.0));
    }

    #[test]
    fn first_error_aborts() {
        let records = vec![
            Ok(EdgeRecord::new("A", "B", None)),
            Err(GraphError::Cancelled),
            Ok(EdgeRecord::new("B", "C", None)),
        ];
        assert!(matches!(
            GraphBuilder::new(false).build(records),
            Err(GraphError::Cancelled)
        ));
    }

    #[test]
    fn stream_counters_reach_summary() {
        let stream = EdgeStream::from_reader(
            Cursor::new(b"p1 p2 score\nA B 1\nbroken\nB C 2\n".to_vec()),
            "fixture",
            ParseMode::Lenient,
        )
        .expect("open");
        let g = GraphBuilder::new(false).build_stream(stream).expect("build");
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.summary().header_skipped, 1);
        assert_eq!(g.summary().malformed_lines, 1);
        assert_eq!(g.summary().records, 2);
        assert!(!g.summary().is_clean());
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let g = GraphBuilder::new(true).build(Vec::new()).expect("build");
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
        assert!(g.is_directed());
    }
}
