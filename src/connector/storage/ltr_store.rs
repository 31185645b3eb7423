use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::metadata_store::atomic_write;
use crate::domain::{DomainError, RankWeights};

/// Per-repo learning-to-rank weight store.
///
/// Reads are lock-free (plain file reads of an atomically written
/// document); writes serialize per repo through a lock so concurrent
/// feedback never interleaves a read-modify-write.
pub struct LtrStore {
    base_dir: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LtrStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn weights_file(&self, repo_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", repo_id))
    }

    async fn lock_for(&self, repo_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks
            .entry(repo_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Learned weights for the repo, or `None` when feedback has never been
    /// recorded.
    pub fn load(&self, repo_id: &str) -> Option<RankWeights> {
        let raw = fs::read(self.weights_file(repo_id)).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub fn load_or_default(&self, repo_id: &str) -> RankWeights {
        self.load(repo_id).unwrap_or_default()
    }

    pub async fn save(&self, repo_id: &str, weights: &RankWeights) -> Result<(), DomainError> {
        let lock = self.lock_for(repo_id).await;
        let _guard = lock.lock().await;
        let payload = serde_json::to_vec_pretty(weights)
            .map_err(|e| DomainError::storage(format!("serialize weights: {}", e)))?;
        atomic_write(&self.weights_file(repo_id), &payload)
    }

    /// Nudge weights from feedback: dependency moves with the centrality gap
    /// between relevant and irrelevant files, recency with the recency gap.
    /// The updated vector is clamped, renormalized and persisted.
    pub async fn update_with_feedback(
        &self,
        repo_id: &str,
        relevant: &[String],
        irrelevant: &[String],
        centrality: &HashMap<String, f64>,
        recency: &HashMap<String, f64>,
    ) -> Result<RankWeights, DomainError> {
        let lock = self.lock_for(repo_id).await;
        let _guard = lock.lock().await;

        let mut weights = self.load(repo_id).unwrap_or_default();

        let mean = |paths: &[String], scores: &HashMap<String, f64>| -> f64 {
            if paths.is_empty() {
                return 0.0;
            }
            paths.iter().map(|p| scores.get(p).copied().unwrap_or(0.0)).sum::<f64>()
                / paths.len() as f64
        };

        let centrality_delta = mean(relevant, centrality) - mean(irrelevant, centrality);
        let recency_delta = mean(relevant, recency) - mean(irrelevant, recency);
        weights.nudge(centrality_delta, recency_delta);

        let payload = serde_json::to_vec_pretty(&weights)
            .map_err(|e| DomainError::storage(format!("serialize weights: {}", e)))?;
        atomic_write(&self.weights_file(repo_id), &payload)?;
        debug!(
            "Updated LTR weights for {}: dependency {:.3}, recency {:.3}",
            repo_id, weights.dependency, weights.recency
        );
        Ok(weights)
    }

    pub fn delete(&self, repo_id: &str) -> Result<bool, DomainError> {
        let path = self.weights_file(repo_id);
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_until_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let store = LtrStore::new(dir.path());
        assert!(store.load("r1").is_none());
        assert_eq!(store.load_or_default("r1"), RankWeights::default());
    }

    #[tokio::test]
    async fn test_feedback_nudges_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = LtrStore::new(dir.path());

        let centrality = HashMap::from([
            ("core.py".to_string(), 0.9),
            ("new.py".to_string(), 0.05),
        ]);
        let recency = HashMap::from([
            ("core.py".to_string(), 0.1),
            ("new.py".to_string(), 0.95),
        ]);

        let updated = store
            .update_with_feedback(
                "r1",
                &["core.py".to_string()],
                &["new.py".to_string()],
                &centrality,
                &recency,
            )
            .await
            .unwrap();

        assert!(updated.dependency > 0.3);
        assert!(updated.recency < 0.1);
        assert!((updated.sum() - 1.0).abs() < 1e-9);
        for v in [updated.semantic, updated.dependency, updated.history, updated.recency] {
            assert!(v > 0.0 && v <= 0.8 + 1e-9);
        }

        // Reload sees the persisted nudge.
        let reloaded = store.load("r1").unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LtrStore::new(dir.path());
        store.save("r1", &RankWeights::default()).await.unwrap();
        assert!(store.delete("r1").unwrap());
        assert!(store.load("r1").is_none());
    }
}
