use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub current: u64,
    pub total: u64,
    pub percentage: f32,
}

/// An index job. Progress is monotonically non-decreasing; `completed` and
/// `failed` are the only terminal states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexJob {
    id: String,
    repo_id: String,
    status: JobStatus,
    progress: JobProgress,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl IndexJob {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repo_id: repo_id.into(),
            status: JobStatus::Queued,
            progress: JobProgress::default(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> JobProgress {
        self.progress
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn start(&mut self, total: u64) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress = JobProgress {
            current: 0,
            total,
            percentage: 0.0,
        };
    }

    /// Advance progress; regressions are ignored to keep it monotonic.
    pub fn advance(&mut self, current: u64) {
        if current <= self.progress.current {
            return;
        }
        self.progress.current = current;
        self.progress.percentage = if self.progress.total > 0 {
            (self.progress.current as f32 / self.progress.total as f32 * 100.0).min(100.0)
        } else {
            0.0
        };
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress.current = self.progress.total;
        self.progress.percentage = 100.0;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}
