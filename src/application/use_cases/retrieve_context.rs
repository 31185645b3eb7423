use std::collections::{HashSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::use_cases::hybrid::hybrid_rerank;
use crate::application::use_cases::ranker::Ranker;
use crate::application::{
    ChatMessage, ChatOptions, EmbeddingService, LlmGateway, RerankingService, SearchFilters,
    VectorRepository,
};
use crate::connector::storage::{LtrStore, SnapshotStore};
use crate::domain::{
    compute_signature, Artifact, Candidate, ContextRequest, ContextResponse, ContextSummary,
    DomainError, EntityType, IndexSnapshot, Reason, RetrievalMode, RetrievedChunk, SliceDirection,
};

/// Distance cut applied to chunks from preferred files (callgraph/slice).
const PREFERRED_FILE_BOOST: f32 = 0.07;
/// Distance cut applied to chunks pulled in by agentic expansion.
const AGENTIC_BOOST: f32 = 0.03;
/// Hard ceiling on agentic iterations, whatever the request asks for.
const AGENTIC_ITER_CEILING: usize = 2;
/// Suggestions considered per agentic iteration.
const AGENTIC_MAX_SUGGESTIONS: usize = 10;
/// Snippet caps for base and neighbor chunks.
const SNIPPET_CAP: usize = 1200;
const NEIGHBOR_SNIPPET_CAP: usize = 1000;

const AGENTIC_SYSTEM_PROMPT: &str = "You are a code assistant optimizing retrieval. \
The user will provide a task and current included files. Respond with a short bullet \
list of additional file paths or function names needed. Only list items, no prose.";

/// Query → ranked code regions, with call-graph and slice expansion,
/// hybrid and cross-encoder re-ranking, signature dedup, and the optional
/// neighbor/agentic expansions.
pub struct RetrieveContextUseCase {
    vector_repo: Arc<dyn VectorRepository>,
    embedder: Arc<dyn EmbeddingService>,
    snapshot_store: Arc<SnapshotStore>,
    ltr_store: Arc<LtrStore>,
    reranker: Option<Arc<dyn RerankingService>>,
    llm_gateway: Option<Arc<dyn LlmGateway>>,
    reranker_topk: usize,
}

impl RetrieveContextUseCase {
    pub fn new(
        vector_repo: Arc<dyn VectorRepository>,
        embedder: Arc<dyn EmbeddingService>,
        snapshot_store: Arc<SnapshotStore>,
        ltr_store: Arc<LtrStore>,
    ) -> Self {
        Self {
            vector_repo,
            embedder,
            snapshot_store,
            ltr_store,
            reranker: None,
            llm_gateway: None,
            reranker_topk: 50,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn RerankingService>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_llm_gateway(mut self, gateway: Arc<dyn LlmGateway>) -> Self {
        self.llm_gateway = Some(gateway);
        self
    }

    pub fn with_reranker_topk(mut self, topk: usize) -> Self {
        self.reranker_topk = topk.max(1);
        self
    }

    pub async fn execute(
        &self,
        repo_id: &str,
        request: &ContextRequest,
    ) -> Result<ContextResponse, DomainError> {
        request.validate().map_err(DomainError::invalid_request)?;

        let mut degraded: Vec<String> = Vec::new();
        let snapshot = match self.snapshot_store.get(repo_id).await {
            Some(s) => s,
            None => {
                degraded.push("index_snapshot".to_string());
                Arc::new(IndexSnapshot::new(repo_id))
            }
        };

        let ranker = match self.ltr_store.load(repo_id) {
            Some(weights) => Ranker::with_weights(weights),
            None => Ranker::new(),
        };

        let query_embedding = self.embedder.embed_query(&request.query).await?;

        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut preferred_files: HashSet<String> = HashSet::new();

        match request.retrieval_mode {
            RetrievalMode::Callgraph => {
                self.callgraph_phase(
                    repo_id,
                    request,
                    &snapshot,
                    &ranker,
                    &query_embedding,
                    &mut preferred_files,
                    &mut artifacts,
                )
                .await?;
            }
            RetrievalMode::Slice => {
                self.slice_phase(
                    repo_id,
                    request,
                    &snapshot,
                    &mut preferred_files,
                    &mut artifacts,
                )
                .await?;
            }
            RetrievalMode::Vector => {}
        }

        // Chunk retrieval with preferred-file adjustment.
        let mut filters = SearchFilters::for_repo(repo_id).with_entity_type(EntityType::Chunk);
        if let Some(language) = request.languages.first() {
            filters = filters.with_language(language.clone());
        }
        let k = request.max_chunks * 4;
        let mut candidates = self.vector_repo.search(&query_embedding, k, &filters).await?;
        for candidate in candidates.iter_mut() {
            candidate.normalize();
            if preferred_files.contains(candidate.entity.file_path()) {
                candidate.promote(PREFERRED_FILE_BOOST);
            }
        }

        candidates = hybrid_rerank(candidates, &request.query, request.hybrid_alpha);
        candidates = self
            .cross_encode(&request.query, candidates, &mut degraded)
            .await;

        let ranked = ranker.rank(
            candidates,
            &snapshot.centrality,
            &snapshot.history,
            &snapshot.recency,
        );
        let deduped = dedup_by_signature(ranked, &snapshot.signature_counts);

        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut selected: Vec<Candidate> = Vec::new();
        for candidate in deduped {
            let id = candidate.selection_id().to_string();
            if id.is_empty() || !seen_ids.insert(id) {
                continue;
            }
            selected.push(candidate);
            if selected.len() >= request.max_chunks {
                break;
            }
        }

        let mut neighbor_ids: HashSet<String> = HashSet::new();
        if request.expand_neighbors {
            self.expand_neighbors(repo_id, request, &mut selected, &mut seen_ids, &mut neighbor_ids)
                .await?;
        }

        if request.agentic && request.max_agentic_iters > 0 {
            self.agentic_loop(
                repo_id,
                request,
                &snapshot,
                &ranker,
                &query_embedding,
                &mut selected,
                &mut artifacts,
                &mut degraded,
            )
            .await;
        }

        let chunks: Vec<RetrievedChunk> = selected
            .iter()
            .map(|candidate| {
                let cap = if neighbor_ids.contains(candidate.selection_id()) {
                    NEIGHBOR_SNIPPET_CAP
                } else {
                    SNIPPET_CAP
                };
                to_retrieved_chunk(candidate, cap)
            })
            .collect();

        let avg_confidence = if chunks.is_empty() {
            0.0
        } else {
            chunks.iter().map(|c| c.confidence as f32).sum::<f32>() / chunks.len() as f32
        };

        info!(
            "Retrieved {} chunks for repo {} (mode {})",
            chunks.len(),
            repo_id,
            request.retrieval_mode.as_str()
        );

        Ok(ContextResponse {
            query: request.query.clone(),
            chunks,
            summary: ContextSummary {
                total_chunks: selected.len(),
                avg_confidence,
                retrieval_mode: request.retrieval_mode.as_str().to_string(),
                degraded,
            },
            artifacts,
        })
    }

    /// Callgraph mode: promote the files of the best-matching functions and
    /// attach a bounded call-graph rendering.
    #[allow(clippy::too_many_arguments)]
    async fn callgraph_phase(
        &self,
        repo_id: &str,
        request: &ContextRequest,
        snapshot: &IndexSnapshot,
        ranker: &Ranker,
        query_embedding: &[f32],
        preferred_files: &mut HashSet<String>,
        artifacts: &mut Vec<Artifact>,
    ) -> Result<(), DomainError> {
        let func_k = request.max_chunks * 6;
        let filters = SearchFilters::for_repo(repo_id).with_entity_type(EntityType::Function);
        let mut functions = self
            .vector_repo
            .search(query_embedding, func_k, &filters)
            .await?;
        for f in functions.iter_mut() {
            f.normalize();
        }
        let functions = dedup_by_signature(functions, &snapshot.signature_counts);
        let functions = self
            .cross_encode(&request.query, functions, &mut Vec::new())
            .await;
        let ranked = ranker.rank(
            functions,
            &snapshot.centrality,
            &snapshot.history,
            &snapshot.recency,
        );

        let promoted = (request.max_chunks / 2).max(3);
        for candidate in ranked.iter().take(promoted) {
            preferred_files.insert(candidate.entity.file_path().to_string());
        }

        let top_names: Vec<String> = ranked
            .iter()
            .take(5)
            .map(|c| c.entity.name().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        // An empty call graph is "no additional signal", never an error.
        let slice = snapshot
            .call_graph
            .slice(&top_names, request.call_graph_depth.max(1), true);
        if !slice.is_empty() {
            artifacts.push(Artifact::mermaid("callgraph", slice.to_mermaid()));
        }
        Ok(())
    }

    /// Slice mode: resolve the seed to a function entity, emit the slice
    /// artifact and prefer the seed's file.
    async fn slice_phase(
        &self,
        repo_id: &str,
        request: &ContextRequest,
        snapshot: &IndexSnapshot,
        preferred_files: &mut HashSet<String>,
        artifacts: &mut Vec<Artifact>,
    ) -> Result<(), DomainError> {
        let seed = request
            .slice_target
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&request.query);

        let seed_entity = self.function_for_name(repo_id, seed).await?;
        let seed_name = seed_entity
            .as_ref()
            .map(|c| c.entity.name().to_string())
            .unwrap_or_else(|| seed.to_string());

        let forward = request.slice_direction == SliceDirection::Forward;
        let direction_label = match request.slice_direction {
            SliceDirection::Forward => "forward",
            SliceDirection::Backward => "backward",
        };
        let slice = snapshot
            .call_graph
            .slice(&[seed_name], request.slice_depth.max(1), forward);
        if !slice.is_empty() {
            artifacts.push(Artifact::mermaid(
                format!("slice({})", direction_label),
                slice.to_mermaid(),
            ));
        }
        if let Some(candidate) = seed_entity {
            preferred_files.insert(candidate.entity.file_path().to_string());
        }
        Ok(())
    }

    /// Resolve a free-text name to its closest function entity.
    async fn function_for_name(
        &self,
        repo_id: &str,
        name: &str,
    ) -> Result<Option<Candidate>, DomainError> {
        let embedding = self.embedder.embed_query(name).await?;
        let filters = SearchFilters::for_repo(repo_id).with_entity_type(EntityType::Function);
        let mut hits = self.vector_repo.search(&embedding, 1, &filters).await?;
        Ok(if hits.is_empty() {
            None
        } else {
            Some(hits.remove(0))
        })
    }

    /// Run the cross-encoder over the head of the candidate list. Reranker
    /// failure degrades to the incoming order.
    async fn cross_encode(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        degraded: &mut Vec<String>,
    ) -> Vec<Candidate> {
        let Some(ref reranker) = self.reranker else {
            return candidates;
        };
        if !reranker.available() || candidates.is_empty() {
            return candidates;
        }
        let topk = candidates.len().min(self.reranker_topk);
        let mut head: Vec<Candidate> = candidates[..topk].to_vec();
        let tail: Vec<Candidate> = candidates[topk..].to_vec();
        debug!("Cross-encoding top {} with {}", topk, reranker.model_name());
        head = match reranker.rerank(query, head, Some(topk)).await {
            Ok(reranked) => reranked,
            Err(e) => {
                warn!("Reranker failed, falling back to weighted ranking: {}", e);
                degraded.push("reranker".to_string());
                return candidates;
            }
        };
        head.extend(tail);
        head
    }

    /// Pull up to two extra chunks per selected chunk from the same file,
    /// closest to the selected chunk's center first.
    async fn expand_neighbors(
        &self,
        repo_id: &str,
        request: &ContextRequest,
        selected: &mut Vec<Candidate>,
        seen_ids: &mut HashSet<String>,
        neighbor_ids: &mut HashSet<String>,
    ) -> Result<(), DomainError> {
        let base: Vec<(String, u32, u32)> = selected
            .iter()
            .map(|c| {
                (
                    c.entity.file_path().to_string(),
                    c.entity.start_line(),
                    c.entity.end_line(),
                )
            })
            .collect();

        for (file_path, start, end) in base {
            if selected.len() >= request.max_chunks {
                break;
            }
            let center = (start + end) / 2;
            let entities = self.vector_repo.get_by_file(repo_id, &file_path).await?;
            let mut file_chunks: Vec<_> = entities
                .into_iter()
                .filter(|e| e.entity_type() == EntityType::Chunk)
                .collect();
            file_chunks.sort_by_key(|e| {
                (e.start_line() as i64 - center as i64).unsigned_abs()
            });

            for entity in file_chunks.into_iter().take(2) {
                if selected.len() >= request.max_chunks {
                    break;
                }
                let id = if entity.chunk_id().is_empty() {
                    entity.id().to_string()
                } else {
                    entity.chunk_id().to_string()
                };
                if !seen_ids.insert(id.clone()) {
                    continue;
                }
                neighbor_ids.insert(id);
                selected.push(Candidate::with_distance(entity, 0.5));
            }
        }
        Ok(())
    }

    /// Bounded loop asking the LLM which files or symbols are missing, then
    /// merging matching chunks with a small promotion bias. Gateway failure
    /// disables the loop; a round that adds nothing ends it.
    #[allow(clippy::too_many_arguments)]
    async fn agentic_loop(
        &self,
        repo_id: &str,
        request: &ContextRequest,
        snapshot: &IndexSnapshot,
        ranker: &Ranker,
        query_embedding: &[f32],
        selected: &mut Vec<Candidate>,
        artifacts: &mut Vec<Artifact>,
        degraded: &mut Vec<String>,
    ) {
        let Some(ref gateway) = self.llm_gateway else {
            degraded.push("llm_gateway".to_string());
            return;
        };

        let iterations = request.max_agentic_iters.min(AGENTIC_ITER_CEILING);
        for _ in 0..iterations {
            let file_list: Vec<String> = {
                let mut seen = HashSet::new();
                selected
                    .iter()
                    .map(|c| c.entity.file_path().to_string())
                    .filter(|f| seen.insert(f.clone()))
                    .take(12)
                    .collect()
            };
            let preview: String = file_list
                .iter()
                .map(|f| format!("- {}", f))
                .collect::<Vec<_>>()
                .join("\n");

            let messages = vec![
                ChatMessage::system(AGENTIC_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Task:\n{}\n\nCurrently included files:\n{}\n\nList more file paths or function symbols that are likely needed:",
                    request.query, preview
                )),
            ];
            let options = ChatOptions {
                temperature: 0.2,
                max_tokens: 120,
            };
            let content = match gateway.chat(&messages, options).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Agentic expansion disabled, gateway unavailable: {}", e);
                    degraded.push("llm_gateway".to_string());
                    return;
                }
            };

            let suggestions = parse_suggestions(&content);
            if suggestions.is_empty() {
                break;
            }
            artifacts.push(Artifact::agentic(suggestions.join("\n")));

            let mut added: Vec<Candidate> = Vec::new();
            for suggestion in &suggestions {
                match self
                    .fetch_for_suggestion(repo_id, suggestion, query_embedding)
                    .await
                {
                    Ok(mut chunks) => added.append(&mut chunks),
                    Err(e) => debug!("Agentic fetch failed for '{}': {}", suggestion, e),
                }
            }

            let known: HashSet<String> = selected
                .iter()
                .map(|c| c.selection_id().to_string())
                .collect();
            added.retain(|c| !known.contains(c.selection_id()));
            if added.is_empty() {
                break;
            }

            for candidate in added.iter_mut() {
                candidate.normalize();
                candidate.promote(AGENTIC_BOOST);
            }

            let mut merged = std::mem::take(selected);
            merged.append(&mut added);
            let ranked = ranker.rank(
                merged,
                &snapshot.centrality,
                &snapshot.history,
                &snapshot.recency,
            );
            let deduped = dedup_by_signature(ranked, &snapshot.signature_counts);

            let mut seen = HashSet::new();
            for candidate in deduped {
                let id = candidate.selection_id().to_string();
                if id.is_empty() || !seen.insert(id) {
                    continue;
                }
                selected.push(candidate);
                if selected.len() >= request.max_chunks {
                    break;
                }
            }
        }
    }

    /// Path-looking suggestions fetch up to three chunks from that file;
    /// symbol-looking ones resolve to a function and pull two chunks from
    /// its file.
    async fn fetch_for_suggestion(
        &self,
        repo_id: &str,
        suggestion: &str,
        query_embedding: &[f32],
    ) -> Result<Vec<Candidate>, DomainError> {
        if suggestion.contains('/') && suggestion.contains('.') {
            let filters = SearchFilters::for_repo(repo_id)
                .with_entity_type(EntityType::Chunk)
                .with_file_path(suggestion);
            return self.vector_repo.search(query_embedding, 3, &filters).await;
        }

        let Some(function) = self.function_for_name(repo_id, suggestion).await? else {
            return Ok(Vec::new());
        };
        let filters = SearchFilters::for_repo(repo_id)
            .with_entity_type(EntityType::Chunk)
            .with_file_path(function.entity.file_path());
        self.vector_repo.search(query_embedding, 2, &filters).await
    }
}

/// First occurrence per signature wins; the kept candidate is annotated when
/// the repo knows the signature was seen more than once at index time.
fn dedup_by_signature(
    candidates: Vec<Candidate>,
    signature_counts: &HashMap<String, u64>,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<Candidate> = Vec::new();
    for mut candidate in candidates {
        let name = candidate.entity.name();
        let name = if name.is_empty() { None } else { Some(name) };
        let sig = compute_signature(candidate.entity.code(), name);
        if !seen.insert(sig.clone()) {
            continue;
        }
        if let Some(&count) = signature_counts.get(&sig) {
            if count > 1 {
                candidate.reasons.push(Reason::new(
                    "dedup",
                    1.0,
                    format!("Deduplicated {} similar definitions", count - 1),
                ));
            }
        }
        kept.push(candidate);
    }
    kept
}

/// Parse the model's plain-text bullets into candidate file paths or symbol
/// names. Unparseable responses yield nothing, which ends the loop.
fn parse_suggestions(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(&['-', '*', '•'][..])
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
                .trim_matches('`')
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(AGENTIC_MAX_SUGGESTIONS)
        .collect()
}

fn to_retrieved_chunk(candidate: &Candidate, snippet_cap: usize) -> RetrievedChunk {
    RetrievedChunk {
        file_path: candidate.entity.file_path().to_string(),
        start_line: candidate.entity.start_line(),
        end_line: candidate.entity.end_line(),
        language: candidate.entity.language().as_str().to_string(),
        snippet: candidate.snippet(snippet_cap),
        confidence: candidate.confidence,
        reasons: candidate.reasons.clone(),
        distance: candidate.distance(),
        chunk_id: candidate.entity.chunk_id().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeEntity, Language};

    fn chunk(file: &str, name: &str, code: &str) -> Candidate {
        let entity = CodeEntity::chunk_entity(
            "r",
            file,
            name.to_string(),
            code.to_string(),
            Language::Python,
            0,
            3,
        );
        Candidate::with_distance(entity, 0.3)
    }

    #[test]
    fn test_dedup_keeps_first_and_annotates() {
        let code = "def login(user, pw):\n    return check(user, pw)";
        let counts = HashMap::from([(
            compute_signature(code, Some("login")),
            2u64,
        )]);

        let kept = dedup_by_signature(
            vec![chunk("a.py", "login", code), chunk("c.py", "login", code)],
            &counts,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].entity.file_path(), "a.py");
        let dedup_reason = kept[0].reasons.iter().find(|r| r.kind == "dedup").unwrap();
        assert_eq!(dedup_reason.explanation, "Deduplicated 1 similar definitions");
    }

    #[test]
    fn test_dedup_unique_signatures_untouched() {
        let kept = dedup_by_signature(
            vec![chunk("a.py", "login", "a"), chunk("b.py", "logout", "b")],
            &HashMap::new(),
        );
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.reasons.is_empty()));
    }

    #[test]
    fn test_parse_suggestions_strips_bullets() {
        let content = "- src/auth/login.py\n* issue_token\n1. src/db.py\n\n• hash_pw\n";
        let parsed = parse_suggestions(content);
        assert_eq!(
            parsed,
            vec!["src/auth/login.py", "issue_token", "src/db.py", "hash_pw"]
        );
    }

    #[test]
    fn test_parse_suggestions_caps_at_ten() {
        let content = (0..20)
            .map(|i| format!("- file{}.py", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_suggestions(&content).len(), AGENTIC_MAX_SUGGESTIONS);
    }

    #[test]
    fn test_parse_suggestions_empty_on_blank() {
        assert!(parse_suggestions("\n   \n").is_empty());
    }
}
