//! # Property-Based Tests
//!
//! Determinism and counting invariants of the parse/build pipeline.

use grafetch_core::{
    EdgeRecord, EdgeStream, Graph, GraphBuilder, GraphSurface, NodeIndex, ParseMode,
    StatisticsReporter, graph_from_bytes, graph_to_bytes,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::io::Cursor;

fn build(directed: bool, pairs: &[(u8, u8)]) -> Graph {
    GraphBuilder::new(directed)
        .build(
            pairs
                .iter()
                .map(|(s, d)| Ok(EdgeRecord::new(format!("n{s}"), format!("n{d}"), None)))
                .collect::<Vec<_>>(),
        )
        .expect("build")
}

fn edge_list_text(pairs: &[(u8, u8)]) -> String {
    pairs
        .iter()
        .map(|(s, d)| format!("n{s} n{d} 1\n"))
        .collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Same record sequence produces the same graph, bit for bit.
    #[test]
    fn determinism_identical_input_produces_identical_output(
        pairs in vec((0u8..40, 0u8..40), 0..120),
        directed in any::<bool>()
    ) {
        let g1 = build(directed, &pairs);
        let g2 = build(directed, &pairs);
        prop_assert_eq!(&g1, &g2);

        let r1 = StatisticsReporter::default().report("p", &g1, g1.summary());
        let r2 = StatisticsReporter::default().report("p", &g2, g2.summary());
        prop_assert_eq!(r1, r2);
    }

    /// Edges plus duplicates account for every record.
    #[test]
    fn records_split_into_edges_and_duplicates(
        pairs in vec((0u8..20, 0u8..20), 0..100),
        directed in any::<bool>()
    ) {
        let g = build(directed, &pairs);
        let summary = g.summary();
        prop_assert_eq!(summary.records, pairs.len() as u64);
        prop_assert_eq!(g.edge_count() as u64 + summary.duplicate_count, summary.records);

        let distinct: BTreeSet<(u8, u8)> = pairs
            .iter()
            .map(|&(s, d)| if directed || s <= d { (s, d) } else { (d, s) })
            .collect();
        prop_assert_eq!(g.edge_count(), distinct.len());
    }

    /// Undirected adjacency is symmetric and degrees sum to 2E minus loops.
    #[test]
    fn undirected_adjacency_is_symmetric(pairs in vec((0u8..25, 0u8..25), 0..80)) {
        let g = build(false, &pairs);
        let mut degree_sum = 0usize;
        for i in 0..g.node_count() {
            let node = NodeIndex(i as u32);
            degree_sum += g.degree(node);
            for (other, _) in g.neighbors(node) {
                prop_assert!(g.neighbors(other).iter().any(|(back, _)| *back == node));
            }
        }
        prop_assert_eq!(degree_sum, 2 * g.edge_count() - g.self_loop_count());
    }

    /// Node indices follow first appearance in the stream.
    #[test]
    fn indices_follow_first_appearance(pairs in vec((0u8..30, 0u8..30), 1..60)) {
        let g = build(false, &pairs);
        let mut order = Vec::new();
        for &(s, d) in &pairs {
            for n in [s, d] {
                if !order.contains(&n) {
                    order.push(n);
                }
            }
        }
        for (i, n) in order.iter().enumerate() {
            prop_assert_eq!(g.node_index(&format!("n{n}")), Some(NodeIndex(i as u32)));
        }
    }

    /// Parsing the text form builds the same graph as the records.
    #[test]
    fn parsed_text_matches_records(pairs in vec((0u8..30, 0u8..30), 0..60)) {
        let stream = EdgeStream::from_reader(
            Cursor::new(edge_list_text(&pairs).into_bytes()),
            "prop",
            ParseMode::Strict,
        )
        .expect("open");
        let parsed = GraphBuilder::new(false).build_stream(stream).expect("build");
        let direct = GraphBuilder::new(false)
            .build(
                pairs
                    .iter()
                    .map(|(s, d)| Ok(EdgeRecord::new(format!("n{s}"), format!("n{d}"), Some(1.0))))
                    .collect::<Vec<_>>(),
            )
            .expect("build");
        prop_assert_eq!(
            parsed.edges().collect::<Vec<_>>(),
            direct.edges().collect::<Vec<_>>()
        );
        prop_assert_eq!(parsed.names(), direct.names());
    }

    /// Snapshots restore an equal graph.
    #[test]
    fn snapshot_restores_equal_graph(
        pairs in vec((0u8..30, 0u8..30), 0..60),
        directed in any::<bool>()
    ) {
        let g = build(directed, &pairs);
        let restored = graph_from_bytes(&graph_to_bytes(&g).expect("encode")).expect("decode");
        prop_assert_eq!(restored, g);
    }

    /// Density stays within [0, 1].
    #[test]
    fn density_is_bounded(
        pairs in vec((0u8..15, 0u8..15), 0..120),
        directed in any::<bool>()
    ) {
        let g = build(directed, &pairs);
        let report = StatisticsReporter::default().report("p", &g, g.summary());
        prop_assert!(report.density >= 0.0);
        prop_assert!(report.density <= 1.0);
        prop_assert!(report.connected_component_count <= g.node_count());
    }
}
