use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Process-wide request → response cache.
///
/// Keys hash the request body together with a per-repo version; completing
/// an index bumps the version, which invalidates every cached response for
/// that repo without scanning. Entries expire after the TTL.
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, Value)>>,
    versions: RwLock<HashMap<String, u64>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn key(&self, repo_id: &str, request_body: &Value) -> String {
        let version = self
            .versions
            .read()
            .await
            .get(repo_id)
            .copied()
            .unwrap_or(0);
        let mut hasher = Sha256::new();
        hasher.update(repo_id.as_bytes());
        hasher.update(version.to_le_bytes());
        hasher.update(request_body.to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    pub async fn set(&self, key: String, value: Value) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= ttl);
        entries.insert(key, (Instant::now(), value));
    }

    /// Invalidate all cached responses for a repo by bumping its version.
    pub async fn bump_version(&self, repo_id: &str) {
        let mut versions = self.versions.write().await;
        *versions.entry(repo_id.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_hit_and_miss() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let body = json!({"query": "login", "max_chunks": 3});
        let key = cache.key("r1", &body).await;

        assert!(cache.get(&key).await.is_none());
        cache.set(key.clone(), json!({"chunks": []})).await;
        assert!(cache.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_version_bump_changes_key() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let body = json!({"query": "login"});
        let before = cache.key("r1", &body).await;
        cache.bump_version("r1").await;
        let after = cache.key("r1", &body).await;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        let key = cache.key("r1", &json!({})).await;
        cache.set(key.clone(), json!(1)).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_distinct_bodies_distinct_keys() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let a = cache.key("r1", &json!({"query": "a"})).await;
        let b = cache.key("r1", &json!({"query": "b"})).await;
        assert_ne!(a, b);
    }
}
