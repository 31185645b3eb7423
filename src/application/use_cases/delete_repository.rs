use std::sync::Arc;

use tracing::info;

use crate::application::VectorRepository;
use crate::connector::storage::{LtrStore, MetadataStore, RepositoryStore, SnapshotStore};
use crate::domain::DomainError;

/// Remove a repository and everything derived from it: vector rows, the
/// published snapshot, persisted metadata and learned weights.
pub struct DeleteRepositoryUseCase {
    repository_store: Arc<RepositoryStore>,
    snapshot_store: Arc<SnapshotStore>,
    metadata_store: Arc<MetadataStore>,
    ltr_store: Arc<LtrStore>,
    vector_repo: Arc<dyn VectorRepository>,
}

impl DeleteRepositoryUseCase {
    pub fn new(
        repository_store: Arc<RepositoryStore>,
        snapshot_store: Arc<SnapshotStore>,
        metadata_store: Arc<MetadataStore>,
        ltr_store: Arc<LtrStore>,
        vector_repo: Arc<dyn VectorRepository>,
    ) -> Self {
        Self {
            repository_store,
            snapshot_store,
            metadata_store,
            ltr_store,
            vector_repo,
        }
    }

    pub async fn execute(&self, repo_id: &str) -> Result<u64, DomainError> {
        if self.repository_store.get(repo_id).await.is_none() {
            return Err(DomainError::not_found(format!("repository {}", repo_id)));
        }

        let removed_entities = self.vector_repo.delete_repository(repo_id).await?;
        self.snapshot_store.remove(repo_id).await;
        self.metadata_store.delete(repo_id)?;
        self.ltr_store.delete(repo_id)?;
        self.repository_store.delete(repo_id).await?;

        info!(
            "Deleted repository {} ({} vector entities)",
            repo_id, removed_entities
        );
        Ok(removed_entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::InMemoryVectorStore;
    use crate::domain::{CodeEntity, IndexMetadata, IndexSnapshot, Language, RankWeights, Repository};

    #[tokio::test]
    async fn test_delete_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let repos = Arc::new(RepositoryStore::new(dir.path()));
        let snapshots = Arc::new(SnapshotStore::new());
        let metadata = Arc::new(MetadataStore::new(dir.path().join("meta")));
        let ltr = Arc::new(LtrStore::new(dir.path().join("ltr")));
        let vectors = Arc::new(InMemoryVectorStore::new());

        repos
            .save(Repository::new("demo".to_string(), "/tmp/demo".to_string()).with_id("r1"))
            .await
            .unwrap();
        snapshots.publish(IndexSnapshot::new("r1")).await;
        metadata
            .save(&IndexMetadata {
                repo_id: "r1".to_string(),
                ..Default::default()
            })
            .unwrap();
        ltr.save("r1", &RankWeights::default()).await.unwrap();
        vectors
            .upsert(vec![CodeEntity::file_entity("r1", "a.py", Language::Python, 5)
                .with_embedding(vec![1.0, 0.0])])
            .await
            .unwrap();

        let use_case = DeleteRepositoryUseCase::new(
            repos.clone(),
            snapshots.clone(),
            metadata.clone(),
            ltr.clone(),
            vectors.clone(),
        );
        let removed = use_case.execute("r1").await.unwrap();

        assert_eq!(removed, 1);
        assert!(repos.get("r1").await.is_none());
        assert!(snapshots.get("r1").await.is_none());
        assert!(metadata.load("r1").unwrap().is_none());
        assert!(ltr.load("r1").is_none());
        assert_eq!(vectors.count_entities("r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_repo() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = DeleteRepositoryUseCase::new(
            Arc::new(RepositoryStore::new(dir.path())),
            Arc::new(SnapshotStore::new()),
            Arc::new(MetadataStore::new(dir.path().join("meta"))),
            Arc::new(LtrStore::new(dir.path().join("ltr"))),
            Arc::new(InMemoryVectorStore::new()),
        );
        assert!(use_case.execute("nope").await.unwrap_err().is_not_found());
    }
}
