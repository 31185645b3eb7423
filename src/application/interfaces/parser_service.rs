use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DomainError, Language, ParsedFile};

/// Syntactic analysis of source files: entities, imports and chunk spans.
#[async_trait]
pub trait ParserService: Send + Sync {
    /// Parse one file. Returns `None` when the language is unsupported for
    /// AST parsing.
    async fn parse_file(
        &self,
        content: &str,
        relative_path: &str,
    ) -> Result<Option<ParsedFile>, DomainError>;

    /// Walk a repository tree, parse every supported file and return the
    /// parses plus a language → file-count map.
    async fn parse_repository(
        &self,
        root: &Path,
    ) -> Result<(Vec<ParsedFile>, HashMap<String, u64>), DomainError>;

    fn supports_language(&self, language: Language) -> bool;
}
