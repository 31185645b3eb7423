use async_trait::async_trait;

use crate::domain::{Candidate, CodeEntity, DomainError, EntityType};

/// Payload filters applied during similarity search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub repo_id: String,
    pub language: Option<String>,
    pub entity_type: Option<EntityType>,
    pub file_path: Option<String>,
}

impl SearchFilters {
    pub fn for_repo(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// Vector storage and similarity search operations.
///
/// Candidates come back ordered by increasing distance (smaller is closer).
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Write or replace entities keyed by id. The whole batch shares one
    /// embedding dimension; mismatching rows are rejected.
    async fn upsert(&self, entities: Vec<CodeEntity>) -> Result<(), DomainError>;

    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>, DomainError>;

    async fn get_by_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Vec<CodeEntity>, DomainError>;

    async fn delete_by_file(&self, repo_id: &str, file_path: &str) -> Result<u64, DomainError>;

    async fn delete_repository(&self, repo_id: &str) -> Result<u64, DomainError>;

    async fn count_entities(&self, repo_id: &str) -> Result<u64, DomainError>;
}
