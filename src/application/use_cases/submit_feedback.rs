use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::connector::storage::{LtrStore, SnapshotStore};
use crate::domain::{DomainError, RankWeights};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub relevant_files: Vec<String>,
    #[serde(default)]
    pub irrelevant_files: Vec<String>,
}

/// Turn user feedback into a per-repo ranking-weight nudge.
pub struct SubmitFeedbackUseCase {
    snapshot_store: Arc<SnapshotStore>,
    ltr_store: Arc<LtrStore>,
}

impl SubmitFeedbackUseCase {
    pub fn new(snapshot_store: Arc<SnapshotStore>, ltr_store: Arc<LtrStore>) -> Self {
        Self {
            snapshot_store,
            ltr_store,
        }
    }

    pub async fn execute(
        &self,
        repo_id: &str,
        feedback: &FeedbackRequest,
    ) -> Result<RankWeights, DomainError> {
        let snapshot = self
            .snapshot_store
            .get(repo_id)
            .await
            .ok_or_else(|| DomainError::not_found(format!("repository {} index", repo_id)))?;

        let weights = self
            .ltr_store
            .update_with_feedback(
                repo_id,
                &feedback.relevant_files,
                &feedback.irrelevant_files,
                &snapshot.centrality,
                &snapshot.recency,
            )
            .await?;

        info!(
            "Recorded feedback for {}: {} relevant, {} irrelevant",
            repo_id,
            feedback.relevant_files.len(),
            feedback.irrelevant_files.len()
        );
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IndexSnapshot;

    #[tokio::test]
    async fn test_feedback_moves_weights() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = Arc::new(SnapshotStore::new());
        let ltr = Arc::new(LtrStore::new(dir.path()));

        let mut snapshot = IndexSnapshot::new("r1");
        snapshot.centrality.insert("core.py".to_string(), 0.9);
        snapshot.centrality.insert("new.py".to_string(), 0.05);
        snapshot.recency.insert("core.py".to_string(), 0.1);
        snapshot.recency.insert("new.py".to_string(), 0.95);
        snapshots.publish(snapshot).await;

        let use_case = SubmitFeedbackUseCase::new(snapshots, ltr.clone());
        let weights = use_case
            .execute(
                "r1",
                &FeedbackRequest {
                    relevant_files: vec!["core.py".to_string()],
                    irrelevant_files: vec!["new.py".to_string()],
                },
            )
            .await
            .unwrap();

        assert!(weights.dependency > 0.3);
        assert!(weights.recency < 0.1);
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        // The retriever will see the learned weights from now on.
        assert_eq!(ltr.load("r1").unwrap(), weights);
    }

    #[tokio::test]
    async fn test_feedback_without_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = SubmitFeedbackUseCase::new(
            Arc::new(SnapshotStore::new()),
            Arc::new(LtrStore::new(dir.path())),
        );
        let err = use_case
            .execute("missing", &FeedbackRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
