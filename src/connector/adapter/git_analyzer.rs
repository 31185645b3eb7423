use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, warn};

use super::git_cli::GitCli;

const RECENCY_WINDOW_DAYS: i64 = 365;
const COMOD_WINDOW_DAYS: i64 = 183;
const COMOD_TOP: usize = 10;

/// Per-file signals derived from git history.
#[derive(Debug, Clone, Default)]
pub struct GitSignals {
    /// `max(0, 1 − days_since_last_commit/365)`; 0.5 everywhere when git is
    /// unavailable.
    pub recency: HashMap<String, f64>,
    /// Change count over the last 12 months, normalized by the max count.
    pub history: HashMap<String, f64>,
    /// Top co-committed paths per file over the last 6 months, by frequency.
    pub comodification: HashMap<String, Vec<String>>,
}

/// Extracts recency, change-frequency and co-modification signals from one
/// bounded `git log` pass over the last year.
pub struct GitAnalyzer {
    git: GitCli,
}

impl GitAnalyzer {
    pub fn new(git: GitCli) -> Self {
        Self { git }
    }

    pub async fn analyze(&self, repo_path: &Path, files: &[String]) -> GitSignals {
        let output = match self
            .git
            .run(
                &[
                    "log",
                    "--since=365.days",
                    "--format=%ct",
                    "--name-only",
                ],
                repo_path,
            )
            .await
        {
            Ok(out) if out.ok() => out,
            Ok(out) => {
                debug!("git log unavailable ({}), using neutral recency", out.stderr.trim());
                return Self::neutral(files);
            }
            Err(e) => {
                warn!("git log failed: {}", e);
                return Self::neutral(files);
            }
        };

        let now = Utc::now().timestamp();
        let mut last_seen: HashMap<String, i64> = HashMap::new();
        let mut change_counts: HashMap<String, u64> = HashMap::new();
        let mut pair_counts: HashMap<String, HashMap<String, u64>> = HashMap::new();

        for (timestamp, commit_files) in parse_log(&output.stdout) {
            for file in &commit_files {
                let entry = last_seen.entry(file.clone()).or_insert(timestamp);
                *entry = (*entry).max(timestamp);
                *change_counts.entry(file.clone()).or_insert(0) += 1;
            }

            // Pairs only count inside the co-modification window.
            if now - timestamp <= COMOD_WINDOW_DAYS * 86_400 {
                for (i, a) in commit_files.iter().enumerate() {
                    for b in commit_files.iter().skip(i + 1) {
                        *pair_counts.entry(a.clone()).or_default().entry(b.clone()).or_insert(0) +=
                            1;
                        *pair_counts.entry(b.clone()).or_default().entry(a.clone()).or_insert(0) +=
                            1;
                    }
                }
            }
        }

        let mut signals = GitSignals::default();

        for file in files {
            let recency = match last_seen.get(file) {
                Some(&ts) => {
                    let days = ((now - ts).max(0) as f64) / 86_400.0;
                    (1.0 - days / RECENCY_WINDOW_DAYS as f64).max(0.0)
                }
                None => 0.0,
            };
            signals.recency.insert(file.clone(), recency);
        }

        let max_count = change_counts.values().copied().max().unwrap_or(0);
        for file in files {
            let score = if max_count > 0 {
                change_counts.get(file).copied().unwrap_or(0) as f64 / max_count as f64
            } else {
                0.0
            };
            signals.history.insert(file.clone(), score);
        }

        for (file, partners) in pair_counts {
            let mut ranked: Vec<(String, u64)> = partners.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            signals
                .comodification
                .insert(file, ranked.into_iter().take(COMOD_TOP).map(|(f, _)| f).collect());
        }

        signals
    }

    fn neutral(files: &[String]) -> GitSignals {
        let mut signals = GitSignals::default();
        for file in files {
            signals.recency.insert(file.clone(), 0.5);
            signals.history.insert(file.clone(), 0.0);
        }
        signals
    }
}

/// Parse `git log --format=%ct --name-only` output into
/// `(timestamp, files)` per commit.
fn parse_log(stdout: &str) -> Vec<(i64, Vec<String>)> {
    let mut commits = Vec::new();
    let mut current: Option<(i64, Vec<String>)> = None;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(timestamp) = line.parse::<i64>() {
            if let Some(done) = current.take() {
                commits.push(done);
            }
            current = Some((timestamp, Vec::new()));
        } else if let Some((_, files)) = current.as_mut() {
            files.push(line.to_string());
        }
    }
    if let Some(done) = current {
        commits.push(done);
    }
    commits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_log_blocks() {
        let stdout = "1700000000\na.py\nb.py\n\n1690000000\na.py\n";
        let commits = parse_log(stdout);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].0, 1_700_000_000);
        assert_eq!(commits[0].1, vec!["a.py", "b.py"]);
        assert_eq!(commits[1].1, vec!["a.py"]);
    }

    #[tokio::test]
    async fn test_non_repo_yields_neutral_recency() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = GitAnalyzer::new(GitCli::new(Duration::from_secs(30)));
        let files = vec!["a.py".to_string(), "b.py".to_string()];
        let signals = analyzer.analyze(dir.path(), &files).await;

        assert_eq!(signals.recency.get("a.py"), Some(&0.5));
        assert_eq!(signals.history.get("b.py"), Some(&0.0));
        assert!(signals.comodification.is_empty());
    }

    #[tokio::test]
    async fn test_real_repo_signals() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let git = GitCli::new(Duration::from_secs(30));
        let run = |args: Vec<&'static str>| {
            let git = git.clone();
            let root = root.to_path_buf();
            async move { git.run(&args, &root).await.unwrap() }
        };

        run(vec!["init", "-q"]).await;
        run(vec!["config", "user.email", "t@example.com"]).await;
        run(vec!["config", "user.name", "t"]).await;

        std::fs::write(root.join("a.py"), "def a(): pass\n").unwrap();
        std::fs::write(root.join("b.py"), "def b(): pass\n").unwrap();
        run(vec!["add", "."]).await;
        run(vec!["commit", "-q", "-m", "both files"]).await;

        std::fs::write(root.join("a.py"), "def a(): return 1\n").unwrap();
        run(vec!["add", "."]).await;
        run(vec!["commit", "-q", "-m", "touch a"]).await;

        let analyzer = GitAnalyzer::new(git.clone());
        let files = vec!["a.py".to_string(), "b.py".to_string()];
        let signals = analyzer.analyze(root, &files).await;

        // Both committed just now: recency near 1.
        assert!(*signals.recency.get("a.py").unwrap() > 0.99);
        // a.py changed twice, b.py once.
        assert_eq!(*signals.history.get("a.py").unwrap(), 1.0);
        assert_eq!(*signals.history.get("b.py").unwrap(), 0.5);
        // The first commit touched both, so each lists the other.
        assert_eq!(
            signals.comodification.get("a.py"),
            Some(&vec!["b.py".to_string()])
        );
    }
}
