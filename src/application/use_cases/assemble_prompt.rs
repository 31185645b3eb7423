use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::use_cases::retrieve_context::RetrieveContextUseCase;
use crate::application::{ChatMessage, EmbeddingService, LlmGateway, SearchFilters, VectorRepository};
use crate::connector::storage::SnapshotStore;
use crate::domain::{
    approx_token_count, Artifact, ContextRequest, DomainError, EntityType, Reason,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a senior code assistant. Use only the provided \
minimal code context. Propose precise, minimal changes. Avoid dumping entire files. Prefer \
patch-style diffs when appropriate.";

/// Chunk text included in a prompt block is capped at this many characters.
const BLOCK_CODE_CAP: usize = 2000;
const SUMMARY_CLASS_CAP: usize = 8;
const SUMMARY_FUNCTION_CAP: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub context: ContextRequest,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_budget")]
    pub max_tokens: usize,
    #[serde(default = "default_true")]
    pub include_dependency_expansion: bool,
    #[serde(default = "default_dep_depth")]
    pub dependency_depth: usize,
    #[serde(default = "default_direction")]
    pub dependency_direction: String,
    #[serde(default = "default_neighbor_files")]
    pub neighbor_files_limit: usize,
    #[serde(default = "default_neighbor_chunks")]
    pub per_file_neighbor_chunks: usize,
    #[serde(default = "default_true")]
    pub include_file_summaries: bool,
}

fn default_budget() -> usize {
    2200
}
fn default_true() -> bool {
    true
}
fn default_dep_depth() -> usize {
    1
}
fn default_direction() -> String {
    "both".to_string()
}
fn default_neighbor_files() -> usize {
    4
}
fn default_neighbor_chunks() -> usize {
    2
}

impl PromptRequest {
    pub fn new(context: ContextRequest) -> Self {
        Self {
            context,
            model: None,
            system_prompt: None,
            max_tokens: default_budget(),
            include_dependency_expansion: true,
            dependency_depth: default_dep_depth(),
            dependency_direction: default_direction(),
            neighbor_files_limit: default_neighbor_files(),
            per_file_neighbor_chunks: default_neighbor_chunks(),
            include_file_summaries: true,
        }
    }

    pub fn with_budget(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn without_dependency_expansion(mut self) -> Self {
        self.include_dependency_expansion = false;
        self
    }

    pub fn without_file_summaries(mut self) -> Self {
        self.include_file_summaries = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedChunk {
    pub id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub confidence: u32,
    pub reasons: Vec<Reason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub budget: usize,
    pub estimated_tokens: usize,
    pub model: String,
    pub chunks_included: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    pub messages: Vec<ChatMessage>,
    pub selected_chunks: Vec<SelectedChunk>,
    pub token_usage: TokenUsage,
    pub artifacts: Vec<Artifact>,
}

/// Greedy token-budgeted prompt packing over retrieved chunks, with
/// hierarchical per-file summaries and dependency-neighborhood expansion.
pub struct AssemblePromptUseCase {
    retriever: Arc<RetrieveContextUseCase>,
    vector_repo: Arc<dyn VectorRepository>,
    embedder: Arc<dyn EmbeddingService>,
    snapshot_store: Arc<SnapshotStore>,
    llm_gateway: Option<Arc<dyn LlmGateway>>,
}

impl AssemblePromptUseCase {
    pub fn new(
        retriever: Arc<RetrieveContextUseCase>,
        vector_repo: Arc<dyn VectorRepository>,
        embedder: Arc<dyn EmbeddingService>,
        snapshot_store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            retriever,
            vector_repo,
            embedder,
            snapshot_store,
            llm_gateway: None,
        }
    }

    /// Use the gateway's exact counter for the final token number.
    pub fn with_llm_gateway(mut self, gateway: Arc<dyn LlmGateway>) -> Self {
        self.llm_gateway = Some(gateway);
        self
    }

    pub async fn execute(
        &self,
        repo_id: &str,
        request: &PromptRequest,
    ) -> Result<PromptResponse, DomainError> {
        let context = self.retriever.execute(repo_id, &request.context).await?;
        let base_chunks = context.chunks;

        let neighbor_chunks = if request.include_dependency_expansion && !base_chunks.is_empty() {
            self.dependency_neighbor_chunks(repo_id, request, &base_chunks)
                .await?
        } else {
            Vec::new()
        };

        let header_blocks = if request.include_file_summaries {
            self.file_summaries(repo_id, &base_chunks).await?
        } else {
            Vec::new()
        };

        let system = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let intro = format!(
            "Task:\n{}\n\nContext chunks follow. Use them to understand and complete the task. \
If info is insufficient, state what additional files or functions you need.",
            request.context.query
        );

        let mut messages = vec![ChatMessage::system(system), ChatMessage::user(intro)];
        let budget = request.max_tokens;
        let mut estimated: usize = messages
            .iter()
            .map(|m| approx_token_count(&m.content))
            .sum();

        for header in header_blocks {
            let cost = approx_token_count(&header);
            if estimated + cost > budget {
                continue;
            }
            estimated += cost;
            messages.push(ChatMessage::user(header));
        }

        let mut selected: Vec<SelectedChunk> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        // Base chunks first, then dependency neighbors; both in rank order.
        for chunk in base_chunks.iter().chain(neighbor_chunks.iter()) {
            if estimated >= budget {
                break;
            }
            let id = if chunk.chunk_id.is_empty() {
                format!("{}:{}-{}", chunk.file_path, chunk.start_line, chunk.end_line)
            } else {
                chunk.chunk_id.clone()
            };
            if !seen.insert(id.clone()) {
                continue;
            }

            let block = chunk_block(
                &chunk.file_path,
                chunk.start_line,
                chunk.end_line,
                &chunk.language,
                &chunk.snippet,
            );
            let cost = approx_token_count(&block);
            if estimated + cost > budget {
                continue;
            }
            estimated += cost;
            messages.push(ChatMessage::user(block));
            selected.push(SelectedChunk {
                id,
                file_path: chunk.file_path.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                language: chunk.language.clone(),
                confidence: chunk.confidence,
                reasons: chunk.reasons.clone(),
            });
        }

        let estimated_tokens = self.final_token_count(&messages, estimated).await;
        debug!(
            "Assembled prompt: {} messages, {} chunks, ~{} tokens of {}",
            messages.len(),
            selected.len(),
            estimated_tokens,
            budget
        );

        Ok(PromptResponse {
            token_usage: TokenUsage {
                budget,
                estimated_tokens,
                model: request.model.clone().unwrap_or_else(|| "default".to_string()),
                chunks_included: selected.len(),
            },
            messages,
            selected_chunks: selected,
            artifacts: context.artifacts,
        })
    }

    /// Files reachable through the dependency graph from the base files,
    /// each contributing its best-matching chunks.
    async fn dependency_neighbor_chunks(
        &self,
        repo_id: &str,
        request: &PromptRequest,
        base_chunks: &[crate::domain::RetrievedChunk],
    ) -> Result<Vec<crate::domain::RetrievedChunk>, DomainError> {
        let Some(snapshot) = self.snapshot_store.get(repo_id).await else {
            return Ok(Vec::new());
        };

        let base_files: Vec<String> = {
            let mut seen = HashSet::new();
            base_chunks
                .iter()
                .map(|c| c.file_path.clone())
                .filter(|f| seen.insert(f.clone()))
                .collect()
        };

        let mut neighbor_files: Vec<String> = Vec::new();
        for file in &base_files {
            let neighbors = snapshot.dependency_graph.dependencies_of(
                file,
                request.dependency_depth.max(1),
                &request.dependency_direction,
            );
            for neighbor in neighbors.imports.into_iter().chain(neighbors.imported_by) {
                if !base_files.contains(&neighbor) && !neighbor_files.contains(&neighbor) {
                    neighbor_files.push(neighbor);
                }
            }
            if neighbor_files.len() >= request.neighbor_files_limit {
                break;
            }
        }
        neighbor_files.truncate(request.neighbor_files_limit);
        if neighbor_files.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(&request.context.query).await?;
        let mut results = Vec::new();
        for file in neighbor_files {
            let mut filters = SearchFilters::for_repo(repo_id)
                .with_entity_type(EntityType::Chunk)
                .with_file_path(&file);
            if let Some(language) = request.context.languages.first() {
                filters = filters.with_language(language.clone());
            }
            let hits = match self
                .vector_repo
                .search(&query_embedding, request.per_file_neighbor_chunks, &filters)
                .await
            {
                Ok(h) => h,
                Err(e) => {
                    warn!("Neighbor chunk lookup failed for {}: {}", file, e);
                    continue;
                }
            };
            for mut candidate in hits {
                candidate.normalize();
                results.push(crate::domain::RetrievedChunk {
                    file_path: candidate.entity.file_path().to_string(),
                    start_line: candidate.entity.start_line(),
                    end_line: candidate.entity.end_line(),
                    language: candidate.entity.language().as_str().to_string(),
                    snippet: candidate.snippet(1200),
                    confidence: candidate.confidence,
                    reasons: candidate.reasons.clone(),
                    distance: candidate.distance(),
                    chunk_id: candidate.entity.chunk_id().to_string(),
                });
            }
        }
        Ok(results)
    }

    /// One header block per selected file listing its classes and functions.
    async fn file_summaries(
        &self,
        repo_id: &str,
        base_chunks: &[crate::domain::RetrievedChunk],
    ) -> Result<Vec<String>, DomainError> {
        let mut files: Vec<String> = {
            let mut seen = HashSet::new();
            base_chunks
                .iter()
                .map(|c| c.file_path.clone())
                .filter(|f| seen.insert(f.clone()))
                .collect()
        };
        files.sort();

        let mut blocks = Vec::new();
        for file in files {
            let entities = self.vector_repo.get_by_file(repo_id, &file).await?;
            let classes: Vec<&str> = entities
                .iter()
                .filter(|e| e.entity_type() == EntityType::Class)
                .map(|e| e.name())
                .take(SUMMARY_CLASS_CAP)
                .collect();
            let functions: Vec<&str> = entities
                .iter()
                .filter(|e| e.entity_type() == EntityType::Function)
                .map(|e| e.name())
                .take(SUMMARY_FUNCTION_CAP)
                .collect();
            blocks.push(format!(
                "File: {}\nClasses: {}\nFunctions: {}",
                file,
                if classes.is_empty() { "-".to_string() } else { classes.join(", ") },
                if functions.is_empty() { "-".to_string() } else { functions.join(", ") },
            ));
        }
        Ok(blocks)
    }

    async fn final_token_count(&self, messages: &[ChatMessage], heuristic: usize) -> usize {
        if let Some(ref gateway) = self.llm_gateway {
            match gateway.count_tokens(messages).await {
                Ok(count) => return count,
                Err(e) => debug!("Token-count endpoint unavailable, using heuristic: {}", e),
            }
        }
        heuristic
    }
}

fn chunk_block(file_path: &str, start: u32, end: u32, language: &str, snippet: &str) -> String {
    let code: String = snippet.chars().take(BLOCK_CODE_CAP).collect();
    format!(
        "File: {}\nLines: {}-{}\nLanguage: {}\n-----\n{}\n-----",
        file_path, start, end, language, code
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_block_format() {
        let block = chunk_block("src/auth.py", 3, 9, "python", "def login(): pass");
        assert!(block.starts_with("File: src/auth.py\nLines: 3-9\nLanguage: python"));
        assert!(block.contains("def login(): pass"));
    }

    #[test]
    fn test_chunk_block_caps_code() {
        let long = "x".repeat(5000);
        let block = chunk_block("a.py", 0, 1, "python", &long);
        assert!(block.len() < 2100);
    }

    #[test]
    fn test_request_defaults() {
        let request = PromptRequest::new(ContextRequest::new("q"));
        assert_eq!(request.max_tokens, 2200);
        assert!(request.include_dependency_expansion);
        assert_eq!(request.dependency_direction, "both");
    }
}
