use std::sync::Arc;

use tracing::info;

use crate::connector::storage::{MetadataStore, SnapshotStore};
use crate::domain::{DomainError, IndexMetadata, IndexSnapshot, SerializedGraph};

/// Merge a dynamic call-graph trace into a repo's stored call graph: new
/// nodes are added, existing edge weights accumulate, new edges append. The
/// merged snapshot replaces the current one and is persisted.
pub struct MergeTraceUseCase {
    snapshot_store: Arc<SnapshotStore>,
    metadata_store: Arc<MetadataStore>,
}

impl MergeTraceUseCase {
    pub fn new(snapshot_store: Arc<SnapshotStore>, metadata_store: Arc<MetadataStore>) -> Self {
        Self {
            snapshot_store,
            metadata_store,
        }
    }

    pub async fn execute(
        &self,
        repo_id: &str,
        trace: &SerializedGraph,
    ) -> Result<(usize, usize), DomainError> {
        let current = self
            .snapshot_store
            .get(repo_id)
            .await
            .ok_or_else(|| DomainError::not_found(format!("repository {} index", repo_id)))?;

        // Snapshots are immutable; build the successor from the persisted
        // form and swap it in.
        let mut next: IndexSnapshot = IndexMetadata::from_snapshot(&current).into_snapshot();
        next.call_graph.merge_trace(trace);

        let nodes = next.call_graph.nodes.len();
        let edges = next.call_graph.edges.len();

        self.metadata_store.save(&IndexMetadata::from_snapshot(&next))?;
        self.snapshot_store.publish(next).await;

        info!(
            "Merged trace into {}: {} nodes, {} edges",
            repo_id, nodes, edges
        );
        Ok((nodes, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GraphEdge, GraphNode};

    #[tokio::test]
    async fn test_merge_accumulates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = Arc::new(SnapshotStore::new());
        let metadata = Arc::new(MetadataStore::new(dir.path()));

        let mut snapshot = IndexSnapshot::new("r1");
        snapshot.call_graph = SerializedGraph {
            nodes: vec![GraphNode::function("login"), GraphNode::function("hash_pw")],
            edges: vec![GraphEdge::calls("login", "hash_pw", 1)],
        };
        snapshots.publish(snapshot).await;

        let trace = SerializedGraph {
            nodes: vec![GraphNode::function("login"), GraphNode::function("audit")],
            edges: vec![
                GraphEdge::calls("login", "hash_pw", 4),
                GraphEdge::calls("login", "audit", 1),
            ],
        };

        let use_case = MergeTraceUseCase::new(snapshots.clone(), metadata.clone());
        let (nodes, edges) = use_case.execute("r1", &trace).await.unwrap();
        assert_eq!(nodes, 3);
        assert_eq!(edges, 2);

        let merged = snapshots.get("r1").await.unwrap();
        let login_edge = merged
            .call_graph
            .edges
            .iter()
            .find(|e| e.target == "hash_pw")
            .unwrap();
        assert_eq!(login_edge.weight, Some(5));

        // The merge survives a reload from disk.
        let reloaded = metadata.load("r1").unwrap().unwrap();
        assert_eq!(reloaded.call_graph.edges.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_without_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = MergeTraceUseCase::new(
            Arc::new(SnapshotStore::new()),
            Arc::new(MetadataStore::new(dir.path())),
        );
        let err = use_case
            .execute("missing", &SerializedGraph::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
