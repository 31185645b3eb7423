use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use ignore::WalkBuilder;
use streaming_iterator::StreamingIterator;
use tracing::{debug, warn};
use tree_sitter::{Parser, Query, QueryCursor};

use crate::application::ParserService;
use crate::domain::{
    build_chunks, DomainError, Language, ParsedEntity, ParsedFile,
};

/// Directories never walked during repository parsing, beyond hidden ones.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    "venv",
    ".venv",
];

/// Which tree-sitter grammar parses a given file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Java,
}

impl Grammar {
    fn for_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "py" => Some(Grammar::Python),
            "js" | "jsx" => Some(Grammar::JavaScript),
            "ts" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            "java" => Some(Grammar::Java),
            _ => None,
        }
    }

    fn language(self) -> tree_sitter::Language {
        match self {
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn entity_query(self) -> &'static str {
        match self {
            Grammar::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition name: (identifier) @name) @class
                (import_statement) @import
                (import_from_statement) @import
                "#
            }
            Grammar::JavaScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_definition name: (property_identifier) @name) @function
                (class_declaration name: (identifier) @name) @class
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (arrow_function)) @function)
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (function_expression)) @function)
                (import_statement) @import
                "#
            }
            Grammar::TypeScript | Grammar::Tsx => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_definition name: (property_identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (arrow_function)) @function)
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (function_expression)) @function)
                (import_statement) @import
                "#
            }
            Grammar::Java => {
                r#"
                (method_declaration name: (identifier) @name) @function
                (constructor_declaration name: (identifier) @name) @function
                (class_declaration name: (identifier) @name) @class
                (import_declaration) @import
                "#
            }
        }
    }
}

pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: Language::all_supported(),
        }
    }

    /// Chunk a file the AST cannot cover: fixed windows over the whole file.
    /// Ingest paths that index unsupported languages opt into this.
    pub fn fixed_chunk_file(&self, content: &str, relative_path: &str) -> ParsedFile {
        let lines: Vec<&str> = content.lines().collect();
        let chunks = build_chunks(&lines, &[], &[], false);
        ParsedFile {
            file_path: relative_path.to_string(),
            language: Language::from_path(Path::new(relative_path)),
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            lines_of_code: lines.len() as u32,
            chunks,
        }
    }

    fn extract(
        &self,
        content: &str,
        relative_path: &str,
        grammar: Grammar,
        language: Language,
    ) -> Result<ParsedFile, DomainError> {
        let ts_language = grammar.language();

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| DomainError::parse(format!("Failed to set language: {}", e)))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| DomainError::parse(format!("Failed to parse {}", relative_path)))?;

        let query = Query::new(&ts_language, grammar.entity_query())
            .map_err(|e| DomainError::parse(format!("Failed to create query: {}", e)))?;

        let capture_names: Vec<&str> = query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let text_bytes = content.as_bytes();

        let mut functions: Vec<ParsedEntity> = Vec::new();
        let mut classes: Vec<ParsedEntity> = Vec::new();
        let mut imports: Vec<String> = Vec::new();

        let mut matches_iter = cursor.matches(&query, tree.root_node(), text_bytes);
        while let Some(query_match) = matches_iter.next() {
            let mut symbol_name: Option<String> = None;
            let mut main_node = None;
            let mut kind = "";

            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                if capture_name == "name" {
                    symbol_name = Some(content[capture.node.byte_range()].to_string());
                } else {
                    main_node = Some(capture.node);
                    kind = capture_name;
                }
            }

            let Some(node) = main_node else { continue };
            let start_line = node.start_position().row as u32;
            let end_line = node.end_position().row as u32;

            match kind {
                "import" => {
                    imports.push(content[node.byte_range()].to_string());
                }
                "function" | "class" => {
                    // Anonymous definitions have no bindable name; skip them.
                    let Some(name) = symbol_name else { continue };
                    let entity = ParsedEntity {
                        name,
                        start_line,
                        end_line,
                        code: content[node.byte_range()].to_string(),
                    };
                    if kind == "function" {
                        functions.push(entity);
                    } else {
                        classes.push(entity);
                    }
                }
                _ => {}
            }
        }

        let lines: Vec<&str> = content.lines().collect();
        let chunks = build_chunks(&lines, &functions, &classes, true);

        debug!(
            "Parsed {}: {} functions, {} classes, {} imports, {} chunks",
            relative_path,
            functions.len(),
            classes.len(),
            imports.len(),
            chunks.len()
        );

        Ok(ParsedFile {
            file_path: relative_path.to_string(),
            language,
            functions,
            classes,
            imports,
            lines_of_code: lines.len() as u32,
            chunks,
        })
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserService for TreeSitterParser {
    async fn parse_file(
        &self,
        content: &str,
        relative_path: &str,
    ) -> Result<Option<ParsedFile>, DomainError> {
        let language = Language::from_path(Path::new(relative_path));
        let Some(grammar) = Grammar::for_path(relative_path) else {
            return Ok(None);
        };
        if !self.supports_language(language) {
            return Ok(None);
        }
        self.extract(content, relative_path, grammar, language)
            .map(Some)
    }

    async fn parse_repository(
        &self,
        root: &Path,
    ) -> Result<(Vec<ParsedFile>, HashMap<String, u64>), DomainError> {
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !EXCLUDED_DIRS.contains(&name.as_ref())
            })
            .build();

        let mut parsed_files = Vec::new();
        let mut language_stats: HashMap<String, u64> = HashMap::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error walking directory: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let language = Language::from_path(path);
            if !self.supports_language(language) {
                continue;
            }

            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            let content = match tokio::fs::read_to_string(path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to read file {}: {}", relative_path, e);
                    continue;
                }
            };

            match self.parse_file(&content, &relative_path).await {
                Ok(Some(parsed)) => {
                    *language_stats
                        .entry(parsed.language.as_str().to_string())
                        .or_insert(0) += 1;
                    parsed_files.push(parsed);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to parse file {}: {}", relative_path, e);
                }
            }
        }

        Ok((parsed_files, language_stats))
    }

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages.contains(&language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkKind;

    #[tokio::test]
    async fn test_parse_python_functions_and_classes() {
        let parser = TreeSitterParser::new();
        let content = r#"import os
from auth.tokens import issue

def login(user, pw):
    return check(user, pw)

class Session:
    def refresh(self):
        return issue(self.user)
"#;
        let parsed = parser
            .parse_file(content, "src/auth.py")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(parsed.language, Language::Python);
        let fn_names: Vec<&str> = parsed.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(fn_names.contains(&"login"));
        assert!(fn_names.contains(&"refresh"));
        assert_eq!(parsed.classes.len(), 1);
        assert_eq!(parsed.classes[0].name, "Session");
        assert_eq!(parsed.imports.len(), 2);
        // 0-based: `def login` sits on line 3.
        let login = parsed.functions.iter().find(|f| f.name == "login").unwrap();
        assert_eq!(login.start_line, 3);
    }

    #[tokio::test]
    async fn test_parse_javascript_arrow_and_methods() {
        let parser = TreeSitterParser::new();
        let content = r#"import { check } from './check';

function login(user, pw) {
    return check(user, pw);
}

const logout = (session) => {
    session.drop();
};

class Store {
    save(record) {
        return this.db.put(record);
    }
}
"#;
        let parsed = parser
            .parse_file(content, "src/auth.js")
            .await
            .unwrap()
            .unwrap();

        let fn_names: Vec<&str> = parsed.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(fn_names.contains(&"login"));
        assert!(fn_names.contains(&"logout"), "arrow binding extracted");
        assert!(fn_names.contains(&"save"));
        assert_eq!(parsed.classes[0].name, "Store");
        assert_eq!(parsed.imports.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_typescript_keeps_javascript_tag() {
        let parser = TreeSitterParser::new();
        let content = r#"import { Api } from './api';

class Client {
    fetch(id: string): Promise<void> {
        return this.api.get(id);
    }
}
"#;
        let parsed = parser
            .parse_file(content, "web/client.ts")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parsed.language, Language::JavaScript);
        assert_eq!(parsed.classes[0].name, "Client");
        assert!(parsed.functions.iter().any(|f| f.name == "fetch"));
    }

    #[tokio::test]
    async fn test_parse_java_methods_and_constructors() {
        let parser = TreeSitterParser::new();
        let content = r#"import java.util.List;

public class AuthService {
    public AuthService() {
    }

    public boolean login(String user, String pw) {
        return true;
    }
}
"#;
        let parsed = parser
            .parse_file(content, "src/AuthService.java")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(parsed.language, Language::Java);
        let fn_names: Vec<&str> = parsed.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(fn_names.contains(&"login"));
        assert!(fn_names.contains(&"AuthService"), "constructor extracted");
        assert_eq!(parsed.classes[0].name, "AuthService");
        assert_eq!(parsed.imports, vec!["import java.util.List;"]);
    }

    #[tokio::test]
    async fn test_unsupported_language_returns_none() {
        let parser = TreeSitterParser::new();
        let parsed = parser.parse_file("SELECT 1;", "schema.sql").await.unwrap();
        assert!(parsed.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_functions_skipped() {
        let parser = TreeSitterParser::new();
        let content = "const handlers = [function() { return 1; }];\n";
        let parsed = parser
            .parse_file(content, "src/h.js")
            .await
            .unwrap()
            .unwrap();
        assert!(parsed.functions.is_empty());
    }

    #[test]
    fn test_fixed_chunk_file_for_unsupported_language() {
        let parser = TreeSitterParser::new();
        let content = (0..300).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let parsed = parser.fixed_chunk_file(&content, "notes.txt");
        assert!(!parsed.chunks.is_empty());
        assert!(parsed.chunks.iter().all(|c| c.kind == ChunkKind::Fixed));
        assert_eq!(parsed.lines_of_code, 300);
    }

    #[tokio::test]
    async fn test_parse_repository_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/app.py"), "def main():\n    pass\n").unwrap();
        std::fs::write(
            root.join("node_modules/pkg/index.js"),
            "function hidden() {}\n",
        )
        .unwrap();

        let parser = TreeSitterParser::new();
        let (files, stats) = parser.parse_repository(root).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_path, "src/app.py");
        assert_eq!(stats.get("python"), Some(&1));
        assert!(stats.get("javascript").is_none());
    }

    #[tokio::test]
    async fn test_chunks_cover_parsed_file() {
        let parser = TreeSitterParser::new();
        let content = r#"# header comment
import os

def a():
    return 1

def b():
    return 2
"#;
        let parsed = parser
            .parse_file(content, "m.py")
            .await
            .unwrap()
            .unwrap();
        let mut covered = vec![false; parsed.lines_of_code as usize];
        for chunk in &parsed.chunks {
            for line in chunk.start_line..=chunk.end_line {
                covered[line as usize] = true;
            }
        }
        assert!(covered.iter().all(|&v| v));
    }
}
