//! Report values and their textual rendering.

use crate::NodeId;
use serde::Serialize;
use std::fmt;

/// A node ranked by degree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CentralNode {
    pub id: NodeId,
    pub degree: usize,
}

/// Descriptive statistics of one graph. Valid for the graph's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphReport {
    pub name: String,
    pub directed: bool,
    pub node_count: usize,
    pub edge_count: usize,
    pub self_loop_count: usize,
    pub duplicate_count: u64,
    pub malformed_lines: u64,
    pub weighted: bool,
    pub density: f64,
    pub connected_component_count: usize,
    pub largest_component_size: usize,
    pub smallest_component_size: usize,
    pub median_degree: usize,
    pub mean_degree: f64,
    pub modal_degree: usize,
    /// Highest degree first, ties by name.
    pub top_k_central_nodes: Vec<CentralNode>,
}

impl GraphReport {
    /// Qualitative density class used in the textual report.
    #[must_use]
    pub fn density_wording(&self) -> &'static str {
        match self.density {
            d if d > 0.1 => "quite dense",
            d if d > 0.01 => "dense",
            d if d > 0.001 => "sparse",
            d if d > 0.0001 => "quite sparse",
            _ => "extremely sparse",
        }
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {one}")
    } else {
        format!("{count} {many}")
    }
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.directed { "directed" } else { "undirected" };
        let weighted = if self.weighted { "weighted " } else { "" };
        write!(
            f,
            "The {kind} graph {} has {} and {} {weighted}edges",
            self.name,
            plural(self.node_count, "node", "nodes"),
            self.edge_count,
        )?;
        match self.self_loop_count {
            0 => write!(f, ", of which none are self-loops.")?,
            1 => write!(f, ", of which 1 is a self-loop.")?,
            n => write!(f, ", of which {n} are self-loops.")?,
        }

        if self.node_count == 0 {
            return Ok(());
        }

        write!(
            f,
            " The graph is {} as it has a density of {:.5}",
            self.density_wording(),
            self.density
        )?;
        if self.connected_component_count == 1 {
            write!(f, " and is connected, as it has a single component.")?;
        } else {
            write!(
                f,
                " and has {} connected components, where the component with most nodes has {} and the component with the least nodes has {}.",
                self.connected_component_count,
                plural(self.largest_component_size, "node", "nodes"),
                plural(self.smallest_component_size, "node", "nodes"),
            )?;
        }

        write!(
            f,
            " The graph median node degree is {}, the mean node degree is {:.2}, and the node degree mode is {}.",
            self.median_degree, self.mean_degree, self.modal_degree
        )?;

        let ranked: Vec<String> = self
            .top_k_central_nodes
            .iter()
            .map(|c| format!("{} (degree {})", c.id, c.degree))
            .collect();
        match ranked.as_slice() {
            [] => {}
            [only] => write!(f, " The most central node is {only}.")?,
            [init @ .., last] => write!(
                f,
                " The top {} most central nodes are {} and {last}.",
                ranked.len(),
                init.join(", ")
            )?,
        }

        if self.duplicate_count > 0 || self.malformed_lines > 0 {
            write!(
                f,
                " While building, {} duplicate edges were merged and {} malformed lines were skipped.",
                self.duplicate_count, self.malformed_lines
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphReport {
        GraphReport {
            name: "Fixture".to_string(),
            directed: false,
            node_count: 3,
            edge_count: 2,
            self_loop_count: 0,
            duplicate_count: 0,
            malformed_lines: 0,
            weighted: true,
            density: 0.666_666_666_666_666_6,
            connected_component_count: 1,
            largest_component_size: 3,
            smallest_component_size: 3,
            median_degree: 1,
            mean_degree: 1.333_333_333_333_333_3,
            modal_degree: 1,
            top_k_central_nodes: vec![
                CentralNode {
                    id: NodeId::new("62977.B"),
                    degree: 2,
                },
                CentralNode {
                    id: NodeId::new("62977.A"),
                    degree: 1,
                },
            ],
        }
    }

    #[test]
    fn density_wording_thresholds() {
        let mut r = sample();
        for (density, wording) in [
            (0.5, "quite dense"),
            (0.05, "dense"),
            (0.005, "sparse"),
            (0.0005, "quite sparse"),
            (0.000_01, "extremely sparse"),
        ] {
            r.density = density;
            assert_eq!(r.density_wording(), wording);
        }
    }

    #[test]
    fn renders_sentence_report() {
        let text = sample().to_string();
        assert!(text.starts_with(
            "The undirected graph Fixture has 3 nodes and 2 weighted edges, of which none are self-loops."
        ));
        assert!(text.contains("density of 0.66667"));
        assert!(text.contains("single component"));
        assert!(text.contains("the mean node degree is 1.33"));
        assert!(text.contains(
            "The top 2 most central nodes are 62977.B (degree 2) and 62977.A (degree 1)."
        ));
        assert!(!text.contains("duplicate"));
    }

    #[test]
    fn renders_components_and_anomalies() {
        let mut r = sample();
        r.connected_component_count = 2;
        r.largest_component_size = 2;
        r.smallest_component_size = 1;
        r.duplicate_count = 4;
        let text = r.to_string();
        assert!(text.contains(
            "has 2 connected components, where the component with most nodes has 2 nodes and the component with the least nodes has 1 node."
        ));
        assert!(text.contains("4 duplicate edges were merged"));
    }

    #[test]
    fn json_uses_report_vocabulary() {
        let value = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(value["connected_component_count"], 1);
        assert_eq!(value["largest_component_size"], 3);
        assert_eq!(value["modal_degree"], 1);
        assert_eq!(value["top_k_central_nodes"][0]["id"], "62977.B");
    }
}
