use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::IndexSnapshot;

/// Holds the published per-repo index snapshots.
///
/// Single-writer, multi-reader: the ingest job builds a fresh
/// [`IndexSnapshot`] off to the side and swaps the pointer on completion.
/// Readers clone the `Arc` and keep observing the old snapshot until they
/// drop it; a failed ingest never replaces the previous snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<HashMap<String, Arc<IndexSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, repo_id: &str) -> Option<Arc<IndexSnapshot>> {
        self.inner.read().await.get(repo_id).cloned()
    }

    pub async fn publish(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let repo_id = snapshot.repo_id.clone();
        let shared = Arc::new(snapshot);
        self.inner.write().await.insert(repo_id.clone(), shared.clone());
        debug!("Published index snapshot for {}", repo_id);
        shared
    }

    pub async fn remove(&self, repo_id: &str) -> bool {
        self.inner.write().await.remove(repo_id).is_some()
    }

    pub async fn repo_ids(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_swap() {
        let store = SnapshotStore::new();
        assert!(store.get("r1").await.is_none());

        let mut first = IndexSnapshot::new("r1");
        first.centrality.insert("a.py".to_string(), 0.5);
        store.publish(first).await;

        let held = store.get("r1").await.unwrap();
        assert_eq!(held.centrality.get("a.py"), Some(&0.5));

        let mut second = IndexSnapshot::new("r1");
        second.centrality.insert("a.py".to_string(), 0.9);
        store.publish(second).await;

        // The old Arc still sees the old data; a fresh read sees the new.
        assert_eq!(held.centrality.get("a.py"), Some(&0.5));
        let fresh = store.get("r1").await.unwrap();
        assert_eq!(fresh.centrality.get("a.py"), Some(&0.9));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SnapshotStore::new();
        store.publish(IndexSnapshot::new("r1")).await;
        assert!(store.remove("r1").await);
        assert!(!store.remove("r1").await);
        assert!(store.get("r1").await.is_none());
    }
}
