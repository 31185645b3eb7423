use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::domain::DomainError;

/// Exit code reported when a subprocess exceeds its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone)]
pub struct GitOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn ok(&self) -> bool {
        self.status == 0
    }

    /// The interesting stream for logging: stdout when present, else stderr.
    pub fn log_line(&self) -> String {
        if !self.stdout.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Bounded-timeout `git` subprocess runner. Every invocation runs inside the
/// given working directory and is killed at the deadline.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run(&self, args: &[&str], cwd: &Path) -> Result<GitOutput, DomainError> {
        self.run_with_timeout(args, cwd, self.timeout).await
    }

    pub async fn run_with_timeout(
        &self,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<GitOutput, DomainError> {
        debug!("git {} (in {})", args.join(" "), cwd.display());
        let child = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => Ok(GitOutput {
                status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(DomainError::upstream(format!(
                "git {} failed to start: {}",
                args.first().unwrap_or(&""),
                e
            ))),
            Err(_) => Ok(GitOutput {
                status: TIMEOUT_EXIT_CODE,
                stdout: String::new(),
                stderr: format!("Timeout running: git {}", args.join(" ")),
            }),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}
