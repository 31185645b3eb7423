use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::{CreatePullRequest, GitHost, PullRequestInfo};
use crate::connector::adapter::GitCli;
use crate::connector::storage::RepositoryStore;
use crate::domain::{validate_patch, DomainError, PatchValidation};

const FETCH_TIMEOUT: Duration = Duration::from_secs(180);
const WORKTREE_TIMEOUT: Duration = Duration::from_secs(180);
const PUSH_TIMEOUT: Duration = Duration::from_secs(240);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyPatchRequest {
    pub patch: String,
    #[serde(default)]
    pub base_branch: Option<String>,
    #[serde(default)]
    pub new_branch: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub create_pr: bool,
    #[serde(default)]
    pub pr_title: Option<String>,
    #[serde(default)]
    pub pr_body: Option<String>,
    #[serde(default)]
    pub draft_pr: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub restrict_to_files: Vec<String>,
    #[serde(default)]
    pub enforce_restriction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPatchResponse {
    pub base_branch: String,
    pub new_branch: String,
    pub commit: Option<String>,
    pub pushed: bool,
    pub pr_created: bool,
    pub pr: Option<PullRequestInfo>,
    pub validation: PatchValidation,
    pub logs: Vec<String>,
    pub files_changed: Vec<String>,
}

/// Validate a unified diff, then apply it through an isolated worktree:
/// fetch, branch off base, dry-run apply (`-p1`, retry `-p0`), commit,
/// optionally push and open a pull request. On failure after the worktree
/// exists its registration is pruned, with files left in place for
/// inspection.
pub struct ApplyPatchUseCase {
    repository_store: Arc<RepositoryStore>,
    git: GitCli,
    git_host: Option<Arc<dyn GitHost>>,
}

impl ApplyPatchUseCase {
    pub fn new(repository_store: Arc<RepositoryStore>, git: GitCli) -> Self {
        Self {
            repository_store,
            git,
            git_host: None,
        }
    }

    pub fn with_git_host(mut self, git_host: Arc<dyn GitHost>) -> Self {
        self.git_host = Some(git_host);
        self
    }

    /// Validation only, no repository mutation.
    pub async fn validate(
        &self,
        repo_id: &str,
        request: &ApplyPatchRequest,
    ) -> Result<PatchValidation, DomainError> {
        let repository = self
            .repository_store
            .get(repo_id)
            .await
            .ok_or_else(|| DomainError::not_found(format!("repository {}", repo_id)))?;
        let restriction = request
            .enforce_restriction
            .then_some(request.restrict_to_files.as_slice());
        Ok(validate_patch(
            &request.patch,
            Some(Path::new(repository.local_path())),
            restriction,
        ))
    }

    pub async fn execute(
        &self,
        repo_id: &str,
        request: &ApplyPatchRequest,
    ) -> Result<ApplyPatchResponse, DomainError> {
        let repository = self
            .repository_store
            .get(repo_id)
            .await
            .ok_or_else(|| DomainError::not_found(format!("repository {}", repo_id)))?;

        let repo_path = PathBuf::from(repository.local_path());
        if !repo_path.is_dir() {
            return Err(DomainError::invalid_request(format!(
                "Local repository path not found: {}",
                repo_path.display()
            )));
        }

        let base_branch = request
            .base_branch
            .clone()
            .unwrap_or_else(|| repository.branch().to_string());

        let restriction = request
            .enforce_restriction
            .then_some(request.restrict_to_files.as_slice());
        let validation = validate_patch(&request.patch, Some(&repo_path), restriction);
        if !validation.ok {
            return Err(DomainError::patch_invalid(
                validation.issues.clone(),
                validation.files.clone(),
            ));
        }

        let new_branch = request.new_branch.clone().unwrap_or_else(|| {
            let seed = request
                .pr_title
                .as_deref()
                .or(request.commit_message.as_deref())
                .unwrap_or("patch");
            format!("bot/{}-{}", slugify_branch(seed), random_hex(3))
        });
        let commit_message = request
            .commit_message
            .clone()
            .or_else(|| request.pr_title.clone())
            .unwrap_or_else(|| "Automated patch".to_string());

        let mut logs: Vec<String> = Vec::new();

        let fetch = self
            .git
            .run_with_timeout(&["fetch", "--all", "--tags"], &repo_path, FETCH_TIMEOUT)
            .await?;
        logs.push(fetch.log_line());

        // Worktrees live next to the repository, never inside it.
        let parent = repo_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo_path.clone());
        let worktrees_root = parent.join("worktrees");
        std::fs::create_dir_all(&worktrees_root)?;
        let worktree_dir = worktrees_root.join(format!(
            "{}_{}",
            new_branch.replace('/', "_"),
            random_hex(4)
        ));
        let worktree_str = worktree_dir.to_string_lossy().to_string();

        let add = self
            .git
            .run_with_timeout(
                &[
                    "worktree",
                    "add",
                    "-b",
                    &new_branch,
                    &worktree_str,
                    &base_branch,
                ],
                &repo_path,
                WORKTREE_TIMEOUT,
            )
            .await?;
        logs.push(add.log_line());
        if !add.ok() {
            return Err(DomainError::upstream(format!(
                "Failed to create worktree/branch: {}",
                add.stderr.trim()
            )));
        }

        let outcome = self
            .apply_in_worktree(
                request,
                &validation,
                &base_branch,
                &new_branch,
                &worktree_dir,
                &commit_message,
                &mut logs,
            )
            .await;

        match outcome {
            Ok(response) => {
                if request.dry_run {
                    // Nothing was committed; release the worktree entirely.
                    let _ = std::fs::remove_dir_all(&worktree_dir);
                }
                let _ = self.git.run(&["worktree", "prune"], &repo_path).await;
                Ok(response)
            }
            Err(e) => {
                // Keep files for inspection, drop the registration.
                let _ = self.git.run(&["worktree", "prune"], &repo_path).await;
                warn!("Patch apply failed on {}: {}", new_branch, e);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_in_worktree(
        &self,
        request: &ApplyPatchRequest,
        validation: &PatchValidation,
        base_branch: &str,
        new_branch: &str,
        worktree_dir: &Path,
        commit_message: &str,
        logs: &mut Vec<String>,
    ) -> Result<ApplyPatchResponse, DomainError> {
        let mut patch_file = tempfile::NamedTempFile::new()?;
        patch_file.write_all(request.patch.as_bytes())?;
        patch_file.flush()?;
        let patch_path = patch_file.path().to_string_lossy().to_string();

        // Dry-run first: -p1, then -p0.
        let strip = {
            let p1 = self
                .git
                .run(&["apply", "--check", "-p1", &patch_path], worktree_dir)
                .await?;
            logs.push(p1.log_line());
            if p1.ok() {
                "-p1"
            } else {
                let p0 = self
                    .git
                    .run(&["apply", "--check", "-p0", &patch_path], worktree_dir)
                    .await?;
                logs.push(p0.log_line());
                if !p0.ok() {
                    return Err(DomainError::patch_invalid(
                        vec![format!("Patch does not apply cleanly: {}", p0.stderr.trim())],
                        validation.files.clone(),
                    ));
                }
                "-p0"
            }
        };

        if request.dry_run {
            return Ok(ApplyPatchResponse {
                base_branch: base_branch.to_string(),
                new_branch: new_branch.to_string(),
                commit: None,
                pushed: false,
                pr_created: false,
                pr: None,
                validation: validation.clone(),
                logs: logs.clone(),
                files_changed: validation.files.clone(),
            });
        }

        let apply = self
            .git
            .run(&["apply", strip, "--index", &patch_path], worktree_dir)
            .await?;
        logs.push(apply.log_line());
        if !apply.ok() {
            return Err(DomainError::patch_invalid(
                vec![format!("Patch apply failed: {}", apply.stderr.trim())],
                validation.files.clone(),
            ));
        }

        let add = self.git.run(&["add", "-A"], worktree_dir).await?;
        logs.push(add.log_line());

        let commit = self
            .git
            .run(&["commit", "-m", commit_message], worktree_dir)
            .await?;
        logs.push(commit.log_line());
        if !commit.ok() {
            return Err(DomainError::upstream(format!(
                "Commit failed: {}",
                commit.stderr.trim()
            )));
        }

        let rev = self.git.run(&["rev-parse", "HEAD"], worktree_dir).await?;
        let commit_sha = rev.stdout.trim().to_string();

        let mut pushed = false;
        if request.push || request.create_pr {
            let push = self
                .git
                .run_with_timeout(
                    &["push", "-u", "origin", new_branch],
                    worktree_dir,
                    PUSH_TIMEOUT,
                )
                .await?;
            logs.push(push.log_line());
            if !push.ok() {
                return Err(DomainError::upstream(format!(
                    "Push failed: {}",
                    push.stderr.trim()
                )));
            }
            pushed = true;
        }

        let mut pr_created = false;
        let mut pr_info = None;
        if request.create_pr {
            let host = self.git_host.as_ref().ok_or_else(|| {
                DomainError::upstream("No Git host configured for pull requests")
            })?;
            let title = request
                .pr_title
                .clone()
                .unwrap_or_else(|| commit_message.to_string());
            let body = request.pr_body.clone().unwrap_or_else(|| {
                format!(
                    "Automated patch.\n\nCommit: {}\nBranch: {}",
                    commit_sha, new_branch
                )
            });
            let pr = host
                .create_pr(CreatePullRequest {
                    title,
                    head: new_branch.to_string(),
                    base: base_branch.to_string(),
                    body,
                    draft: request.draft_pr,
                    connection_id: None,
                })
                .await?;
            pr_created = true;
            pr_info = Some(pr);
        }

        info!(
            "Applied patch on {} (commit {}, {} files)",
            new_branch,
            commit_sha,
            validation.files.len()
        );

        Ok(ApplyPatchResponse {
            base_branch: base_branch.to_string(),
            new_branch: new_branch.to_string(),
            commit: Some(commit_sha),
            pushed,
            pr_created,
            pr: pr_info,
            validation: validation.clone(),
            logs: logs.clone(),
            files_changed: validation.files.clone(),
        })
    }
}

fn slugify_branch(text: &str) -> String {
    let mut slug: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    let slug = slug.trim_matches(&['-', '/'][..]).to_string();
    let slug = if slug.is_empty() { "patch".to_string() } else { slug };
    slug.chars().take(40).collect()
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_branch() {
        assert_eq!(slugify_branch("Fix login bug!"), "Fix-login-bug");
        assert_eq!(slugify_branch("///"), "patch");
        assert!(slugify_branch(&"x".repeat(100)).len() <= 40);
    }

    #[test]
    fn test_random_hex_length_and_variety() {
        let a = random_hex(3);
        let b = random_hex(3);
        assert_eq!(a.len(), 6);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        // Two draws colliding is astronomically unlikely.
        assert_ne!(a, b);
    }
}
