use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{DomainError, IndexMetadata};

/// Atomic JSON persistence for per-repo index metadata. The on-disk file is
/// the source of truth on restart.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    base_dir: PathBuf,
}

impl MetadataStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn meta_file(&self, repo_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", repo_id))
    }

    pub fn save(&self, metadata: &IndexMetadata) -> Result<(), DomainError> {
        let path = self.meta_file(&metadata.repo_id);
        let payload = serde_json::to_vec_pretty(metadata)
            .map_err(|e| DomainError::storage(format!("serialize metadata: {}", e)))?;
        atomic_write(&path, &payload)?;
        debug!("Persisted index metadata for {}", metadata.repo_id);
        Ok(())
    }

    pub fn load(&self, repo_id: &str) -> Result<Option<IndexMetadata>, DomainError> {
        let path = self.meta_file(repo_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&path)?;
        let metadata = serde_json::from_slice(&raw)
            .map_err(|e| DomainError::storage(format!("parse metadata {}: {}", repo_id, e)))?;
        Ok(Some(metadata))
    }

    /// Load every persisted metadata document, skipping unreadable files.
    pub fn load_all(&self) -> Vec<IndexMetadata> {
        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };
        let mut loaded = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(repo_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(repo_id) {
                Ok(Some(metadata)) => loaded.push(metadata),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable metadata {}: {}", repo_id, e),
            }
        }
        loaded
    }

    pub fn delete(&self, repo_id: &str) -> Result<bool, DomainError> {
        let path = self.meta_file(repo_id);
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Write-temp + fsync + rename. The destination either keeps its old
/// content or holds the complete new document.
pub fn atomic_write(path: &Path, payload: &[u8]) -> Result<(), DomainError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IndexSnapshot;

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());

        let mut snapshot = IndexSnapshot::new("r1");
        snapshot.dependency_graph.add_import("a.py", "b.py");
        snapshot.centrality.insert("b.py".to_string(), 0.7);
        store.save(&IndexMetadata::from_snapshot(&snapshot)).unwrap();

        let loaded = store.load("r1").unwrap().unwrap();
        assert_eq!(loaded.repo_id, "r1");
        assert_eq!(loaded.graph.edges.len(), 1);
        assert_eq!(loaded.centrality.get("b.py"), Some(&0.7));
    }

    #[test]
    fn test_load_all_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store
            .save(&IndexMetadata {
                repo_id: "good".to_string(),
                ..Default::default()
            })
            .unwrap();
        fs::write(dir.path().join("bad.json"), b"{not json").unwrap();

        let all = store.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].repo_id, "good");
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store
            .save(&IndexMetadata {
                repo_id: "r1".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(store.delete("r1").unwrap());
        assert!(!store.delete("r1").unwrap());
        assert!(store.load("r1").unwrap().is_none());
    }
}
