use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{DependencyGraph, SerializedGraph};

/// The immutable per-repo index state published by an ingest job and read by
/// retrieval. A new snapshot replaces the previous one atomically; readers
/// holding the old `Arc` keep observing consistent data until they drop it.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    pub repo_id: String,
    pub dependency_graph: DependencyGraph,
    pub centrality: HashMap<String, f64>,
    pub recency: HashMap<String, f64>,
    pub history: HashMap<String, f64>,
    pub comodification: HashMap<String, Vec<String>>,
    pub class_graph: SerializedGraph,
    pub module_graph: SerializedGraph,
    pub call_graph: SerializedGraph,
    pub signature_counts: HashMap<String, u64>,
    pub signature_representative: HashMap<String, String>,
    pub cycles: Vec<Vec<String>>,
}

impl IndexSnapshot {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            ..Default::default()
        }
    }

    pub fn signature_count(&self, sig: &str) -> u64 {
        self.signature_counts.get(sig).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphEdges {
    pub edges: Vec<(String, String)>,
}

/// The JSON document persisted per repo under the index metadata directory.
/// This is the source of truth across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub repo_id: String,
    pub graph: GraphEdges,
    pub centrality: HashMap<String, f64>,
    pub recency: HashMap<String, f64>,
    #[serde(default)]
    pub history: HashMap<String, f64>,
    pub comodification: HashMap<String, Vec<String>>,
    pub class_graph: SerializedGraph,
    pub module_graph: SerializedGraph,
    pub call_graph: SerializedGraph,
    pub signature_counts: HashMap<String, u64>,
    pub signature_representative: HashMap<String, String>,
}

impl IndexMetadata {
    pub fn from_snapshot(snapshot: &IndexSnapshot) -> Self {
        Self {
            repo_id: snapshot.repo_id.clone(),
            graph: GraphEdges {
                edges: snapshot.dependency_graph.edges(),
            },
            centrality: snapshot.centrality.clone(),
            recency: snapshot.recency.clone(),
            history: snapshot.history.clone(),
            comodification: snapshot.comodification.clone(),
            class_graph: snapshot.class_graph.clone(),
            module_graph: snapshot.module_graph.clone(),
            call_graph: snapshot.call_graph.clone(),
            signature_counts: snapshot.signature_counts.clone(),
            signature_representative: snapshot.signature_representative.clone(),
        }
    }

    pub fn into_snapshot(self) -> IndexSnapshot {
        let dependency_graph = DependencyGraph::from_edges(&self.graph.edges);
        let cycles = dependency_graph.cycles();
        IndexSnapshot {
            repo_id: self.repo_id,
            dependency_graph,
            centrality: self.centrality,
            recency: self.recency,
            history: self.history,
            comodification: self.comodification,
            class_graph: self.class_graph,
            module_graph: self.module_graph,
            call_graph: self.call_graph,
            signature_counts: self.signature_counts,
            signature_representative: self.signature_representative,
            cycles,
        }
    }
}
