use std::path::{Component, Path};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_PATCH_FILES: usize = 50;
pub const MAX_PATCH_CHARS: usize = 300_000;

/// One file touched by a unified diff, with its hunk starts in the new file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchFile {
    pub file: String,
    /// `(start_new, len_new)` per `@@` hunk.
    pub hunks: Vec<(u32, u32)>,
}

/// Validator verdict for a patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchValidation {
    pub ok: bool,
    pub issues: Vec<String>,
    pub files: Vec<String>,
}

fn hunk_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@@\s+-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s+@@").unwrap())
}

/// Parse the minimal unified-diff subset we care about: destination file
/// paths from `+++` headers and hunk starts from `@@` lines.
pub fn parse_unified_diff(patch_text: &str) -> Vec<PatchFile> {
    let mut files: Vec<PatchFile> = Vec::new();

    for line in patch_text.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            let raw = rest.split_whitespace().next().unwrap_or("");
            if raw.is_empty() || raw == "/dev/null" {
                continue;
            }
            let path = raw.strip_prefix("b/").or_else(|| raw.strip_prefix("a/")).unwrap_or(raw);
            files.push(PatchFile {
                file: path.to_string(),
                hunks: Vec::new(),
            });
        } else if let Some(caps) = hunk_re().captures(line) {
            if let Some(current) = files.last_mut() {
                let start_new: u32 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                let len_new: u32 = caps
                    .get(4)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(1);
                current.hunks.push((start_new, len_new));
            }
        }
    }

    files
}

fn is_safe_path(path_str: &str) -> bool {
    let path = Path::new(path_str);
    if path.is_absolute() {
        return false;
    }
    !path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

/// Validate a generated patch against the safety rules: relative paths only,
/// no traversal outside the repository, bounded size and file count, and an
/// optional allow-list of files.
pub fn validate_patch(
    patch_text: &str,
    repo_root: Option<&Path>,
    restrict_to_files: Option<&[String]>,
) -> PatchValidation {
    let mut issues: Vec<String> = Vec::new();

    if patch_text.trim().is_empty() {
        return PatchValidation {
            ok: false,
            issues: vec!["Empty patch".to_string()],
            files: Vec::new(),
        };
    }

    if patch_text.len() > MAX_PATCH_CHARS {
        issues.push(format!(
            "Patch exceeds size limit: {} chars > {}",
            patch_text.len(),
            MAX_PATCH_CHARS
        ));
    }

    let parsed = parse_unified_diff(patch_text);
    if parsed.is_empty() {
        issues.push(
            "Could not parse unified diff structure (---/+++ and @@ hunks missing?)".to_string(),
        );
    }
    let files: Vec<String> = parsed.iter().map(|f| f.file.clone()).collect();

    for file in &files {
        if !is_safe_path(file) {
            issues.push(format!("Unsafe path detected: {}", file));
        }
    }

    if let Some(allowed) = restrict_to_files {
        for file in &files {
            if !allowed.iter().any(|a| a == file) {
                issues.push(format!("File not allowed by restriction: {}", file));
            }
        }
    }

    // Best-effort containment check for files that already exist on disk;
    // the patch may legitimately create new files.
    if let Some(root) = repo_root {
        if let Ok(root) = root.canonicalize() {
            for file in &files {
                let candidate = root.join(file);
                if let Ok(resolved) = candidate.canonicalize() {
                    if !resolved.starts_with(&root) {
                        issues.push(format!("File outside repo root: {}", file));
                    }
                }
            }
        }
    }

    if files.len() > MAX_PATCH_FILES {
        issues.push(format!(
            "Too many files modified: {} > {}",
            files.len(),
            MAX_PATCH_FILES
        ));
    }

    PatchValidation {
        ok: issues.is_empty(),
        issues,
        files,
    }
}
