use serde::{Deserialize, Serialize};

use super::Language;

/// Kind of semantic unit indexed in the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    File,
    Class,
    Function,
    Chunk,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::Class => "class",
            EntityType::Function => "function",
            EntityType::Chunk => "chunk",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(EntityType::File),
            "class" => Some(EntityType::Class),
            "function" => Some(EntityType::Function),
            "chunk" => Some(EntityType::Chunk),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row in the vector store: one file, class, function or chunk.
///
/// Ids are globally unique and follow
/// `{repo}:{type}:{path}[:{name|lineRange}]`. Line spans are 0-based and
/// inclusive; file entities carry an empty `code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntity {
    id: String,
    repo_id: String,
    file_path: String,
    entity_type: EntityType,
    name: String,
    code: String,
    language: Language,
    start_line: u32,
    end_line: u32,
    chunk_id: String,
    #[serde(default)]
    embedding: Vec<f32>,
}

impl CodeEntity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        repo_id: String,
        file_path: String,
        entity_type: EntityType,
        name: String,
        code: String,
        language: Language,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            id,
            repo_id,
            file_path,
            entity_type,
            name,
            code,
            language,
            start_line,
            end_line,
            chunk_id: String::new(),
            embedding: Vec::new(),
        }
    }

    pub fn file_entity(
        repo_id: &str,
        file_path: &str,
        language: Language,
        lines_of_code: u32,
    ) -> Self {
        let name = file_path.rsplit('/').next().unwrap_or(file_path).to_string();
        Self::new(
            format!("{}:file:{}", repo_id, file_path),
            repo_id.to_string(),
            file_path.to_string(),
            EntityType::File,
            name,
            String::new(),
            language,
            0,
            lines_of_code,
        )
    }

    pub fn function_entity(
        repo_id: &str,
        file_path: &str,
        name: &str,
        code: String,
        language: Language,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self::new(
            format!("{}:func:{}:{}", repo_id, file_path, name),
            repo_id.to_string(),
            file_path.to_string(),
            EntityType::Function,
            name.to_string(),
            code,
            language,
            start_line,
            end_line,
        )
    }

    pub fn class_entity(
        repo_id: &str,
        file_path: &str,
        name: &str,
        code: String,
        language: Language,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self::new(
            format!("{}:class:{}:{}", repo_id, file_path, name),
            repo_id.to_string(),
            file_path.to_string(),
            EntityType::Class,
            name.to_string(),
            code,
            language,
            start_line,
            end_line,
        )
    }

    /// `name` is the covered entity's name for AST-region chunks and a
    /// synthetic `chunk_{index}` label for fixed windows, so chunk
    /// signatures line up with the entity signatures recorded at index
    /// time.
    pub fn chunk_entity(
        repo_id: &str,
        file_path: &str,
        name: String,
        code: String,
        language: Language,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let chunk_id = format!("{}:chunk:{}:{}-{}", repo_id, file_path, start_line, end_line);
        let mut entity = Self::new(
            chunk_id.clone(),
            repo_id.to_string(),
            file_path.to_string(),
            EntityType::Chunk,
            name,
            code,
            language,
            start_line,
            end_line,
        );
        entity.chunk_id = chunk_id;
        entity
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_shapes() {
        let f = CodeEntity::file_entity("r1", "src/auth.py", Language::Python, 40);
        assert_eq!(f.id(), "r1:file:src/auth.py");
        assert_eq!(f.name(), "auth.py");
        assert!(f.code().is_empty());

        let func = CodeEntity::function_entity(
            "r1",
            "src/auth.py",
            "login",
            "def login(): pass".to_string(),
            Language::Python,
            3,
            5,
        );
        assert_eq!(func.id(), "r1:func:src/auth.py:login");

        let chunk = CodeEntity::chunk_entity(
            "r1",
            "src/auth.py",
            "chunk_0".to_string(),
            "code".to_string(),
            Language::Python,
            0,
            9,
        );
        assert_eq!(chunk.id(), "r1:chunk:src/auth.py:0-9");
        assert_eq!(chunk.chunk_id(), chunk.id());
        assert_eq!(chunk.name(), "chunk_0");
    }

    #[test]
    fn test_span_accessors() {
        let e = CodeEntity::function_entity(
            "r",
            "a.py",
            "f",
            "def f(): pass".to_string(),
            Language::Python,
            2,
            4,
        );
        assert_eq!(e.line_count(), 3);
        assert_eq!(e.location(), "a.py:2-4");
        assert!(!e.has_embedding());
    }

    #[test]
    fn test_entity_type_round_trip() {
        for t in [
            EntityType::File,
            EntityType::Class,
            EntityType::Function,
            EntityType::Chunk,
        ] {
            assert_eq!(EntityType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntityType::parse("module"), None);
    }
}
