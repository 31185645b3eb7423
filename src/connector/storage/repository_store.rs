use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::warn;

use super::metadata_store::atomic_write;
use crate::domain::{DomainError, IndexJob, JobStatus, Repository};

/// Registered repositories, kept in memory and persisted as one atomic JSON
/// document.
pub struct RepositoryStore {
    path: PathBuf,
    inner: RwLock<HashMap<String, Repository>>,
}

impl RepositoryStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join("repositories.json");
        let inner = match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<Vec<Repository>>(&raw) {
                Ok(list) => list.into_iter().map(|r| (r.id().to_string(), r)).collect(),
                Err(e) => {
                    warn!("Could not parse repository store, starting empty: {}", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            inner: RwLock::new(inner),
        }
    }

    async fn persist(&self, repos: &HashMap<String, Repository>) -> Result<(), DomainError> {
        let mut list: Vec<&Repository> = repos.values().collect();
        list.sort_by(|a, b| a.id().cmp(b.id()));
        let payload = serde_json::to_vec_pretty(&list)
            .map_err(|e| DomainError::storage(format!("serialize repositories: {}", e)))?;
        atomic_write(&self.path, &payload)
    }

    pub async fn save(&self, repository: Repository) -> Result<(), DomainError> {
        let mut repos = self.inner.write().await;
        repos.insert(repository.id().to_string(), repository);
        self.persist(&repos).await
    }

    pub async fn get(&self, repo_id: &str) -> Option<Repository> {
        self.inner.read().await.get(repo_id).cloned()
    }

    pub async fn find_by_path(&self, local_path: &str) -> Option<Repository> {
        self.inner
            .read()
            .await
            .values()
            .find(|r| r.local_path() == local_path)
            .cloned()
    }

    pub async fn list(&self) -> Vec<Repository> {
        let mut repos: Vec<Repository> = self.inner.read().await.values().cloned().collect();
        repos.sort_by(|a, b| a.name().cmp(b.name()));
        repos
    }

    pub async fn delete(&self, repo_id: &str) -> Result<bool, DomainError> {
        let mut repos = self.inner.write().await;
        let removed = repos.remove(repo_id).is_some();
        if removed {
            self.persist(&repos).await?;
        }
        Ok(removed)
    }
}

/// In-memory index-job registry. Enforces the one-active-job-per-repo rule.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<HashMap<String, IndexJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queued job. Fails with `Conflict` while another job
    /// for the same repo is still queued or running.
    pub async fn create(&self, repo_id: &str) -> Result<IndexJob, DomainError> {
        let mut jobs = self.inner.write().await;
        if jobs
            .values()
            .any(|j| j.repo_id() == repo_id && j.status().is_active())
        {
            return Err(DomainError::conflict(format!(
                "An index job is already active for repository {}",
                repo_id
            )));
        }
        let job = IndexJob::new(repo_id);
        jobs.insert(job.id().to_string(), job.clone());
        Ok(job)
    }

    pub async fn get(&self, job_id: &str) -> Option<IndexJob> {
        self.inner.read().await.get(job_id).cloned()
    }

    pub async fn update<F>(&self, job_id: &str, mutate: F) -> Result<IndexJob, DomainError>
    where
        F: FnOnce(&mut IndexJob),
    {
        let mut jobs = self.inner.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| DomainError::not_found(format!("job {}", job_id)))?;
        mutate(job);
        Ok(job.clone())
    }

    pub async fn list_for_repo(&self, repo_id: &str) -> Vec<IndexJob> {
        self.inner
            .read()
            .await
            .values()
            .filter(|j| j.repo_id() == repo_id)
            .cloned()
            .collect()
    }
}
