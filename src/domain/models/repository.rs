use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a registered repository's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Local,
    Git,
    GithubHub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryStatus {
    #[default]
    Registered,
    Indexing,
    Indexed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: String,
    name: String,
    source_type: SourceType,
    local_path: String,
    branch: String,
    status: RepositoryStatus,
    created_at: DateTime<Utc>,
    last_indexed_at: Option<DateTime<Utc>>,
}

impl Repository {
    pub fn new(name: String, local_path: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            source_type: SourceType::Local,
            local_path,
            branch: "main".to_string(),
            status: RepositoryStatus::Registered,
            created_at: Utc::now(),
            last_indexed_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn status(&self) -> RepositoryStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_indexed_at(&self) -> Option<DateTime<Utc>> {
        self.last_indexed_at
    }

    pub fn mark_indexing(&mut self) {
        self.status = RepositoryStatus::Indexing;
    }

    pub fn mark_indexed(&mut self) {
        self.status = RepositoryStatus::Indexed;
        self.last_indexed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = RepositoryStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut repo = Repository::new("demo".to_string(), "/tmp/demo".to_string());
        assert_eq!(repo.status(), RepositoryStatus::Registered);
        assert!(repo.last_indexed_at().is_none());

        repo.mark_indexing();
        assert_eq!(repo.status(), RepositoryStatus::Indexing);

        repo.mark_indexed();
        assert_eq!(repo.status(), RepositoryStatus::Indexed);
        assert!(repo.last_indexed_at().is_some());
    }

    #[test]
    fn test_builder_overrides() {
        let repo = Repository::new("demo".to_string(), "/tmp/demo".to_string())
            .with_id("repo-1")
            .with_branch("develop")
            .with_source_type(SourceType::Git);
        assert_eq!(repo.id(), "repo-1");
        assert_eq!(repo.branch(), "develop");
        assert_eq!(repo.source_type(), SourceType::Git);
    }
}
