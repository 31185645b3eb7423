use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::application::{SearchFilters, VectorRepository};
use crate::domain::{Candidate, CodeEntity, DomainError};

/// In-memory vector store: cosine distance over entity embeddings with
/// payload filters. The durable production store is an external ANN
/// database behind the same trait; this adapter backs the CLI and tests.
pub struct InMemoryVectorStore {
    entities: RwLock<HashMap<String, CodeEntity>>,
    dimensions: RwLock<Option<usize>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            dimensions: RwLock::new(None),
        }
    }

    fn matches(entity: &CodeEntity, filters: &SearchFilters) -> bool {
        if entity.repo_id() != filters.repo_id {
            return false;
        }
        if let Some(ref language) = filters.language {
            if entity.language().as_str() != language {
                return false;
            }
        }
        if let Some(entity_type) = filters.entity_type {
            if entity.entity_type() != entity_type {
                return false;
            }
        }
        if let Some(ref file_path) = filters.file_path {
            if entity.file_path() != file_path {
                return false;
            }
        }
        true
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorStore {
    async fn upsert(&self, entities: Vec<CodeEntity>) -> Result<(), DomainError> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut dimensions = self.dimensions.write().await;
        let expected = match *dimensions {
            Some(d) => d,
            None => {
                let first = entities
                    .iter()
                    .find(|e| e.has_embedding())
                    .ok_or_else(|| DomainError::storage("No embedded entities in batch"))?;
                let d = first.embedding().len();
                *dimensions = Some(d);
                d
            }
        };

        let mut store = self.entities.write().await;
        let mut written = 0usize;
        for entity in entities {
            if !entity.has_embedding() {
                warn!("Skipping entity {} without embedding", entity.id());
                continue;
            }
            if entity.embedding().len() != expected {
                warn!(
                    "Rejecting entity {}: dimension {} != {}",
                    entity.id(),
                    entity.embedding().len(),
                    expected
                );
                continue;
            }
            store.insert(entity.id().to_string(), entity);
            written += 1;
        }
        debug!("Upserted {} entities", written);
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>, DomainError> {
        let store = self.entities.read().await;
        let mut scored: Vec<(f32, &CodeEntity)> = store
            .values()
            .filter(|e| Self::matches(e, filters))
            .map(|e| (1.0 - cosine_similarity(embedding, e.embedding()), e))
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, entity)| Candidate::with_distance(entity.clone(), distance))
            .collect())
    }

    async fn get_by_file(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Vec<CodeEntity>, DomainError> {
        let store = self.entities.read().await;
        let mut found: Vec<CodeEntity> = store
            .values()
            .filter(|e| e.repo_id() == repo_id && e.file_path() == file_path)
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.start_line(), e.end_line()));
        Ok(found)
    }

    async fn delete_by_file(&self, repo_id: &str, file_path: &str) -> Result<u64, DomainError> {
        let mut store = self.entities.write().await;
        let before = store.len();
        store.retain(|_, e| !(e.repo_id() == repo_id && e.file_path() == file_path));
        Ok((before - store.len()) as u64)
    }

    async fn delete_repository(&self, repo_id: &str) -> Result<u64, DomainError> {
        let mut store = self.entities.write().await;
        let before = store.len();
        store.retain(|_, e| e.repo_id() != repo_id);
        Ok((before - store.len()) as u64)
    }

    async fn count_entities(&self, repo_id: &str) -> Result<u64, DomainError> {
        let store = self.entities.read().await;
        Ok(store.values().filter(|e| e.repo_id() == repo_id).count() as u64)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
