//! Token-budgeted prompt packing over the in-process retrieval stack.

use std::sync::Arc;

use tempfile::TempDir;

use codecontext::{
    AssemblePromptUseCase, CodeEntity, ContextRequest, EmbeddingService, IndexSnapshot,
    InMemoryVectorStore, Language, LtrStore, MockEmbedding, PromptRequest,
    RetrieveContextUseCase, SnapshotStore, VectorRepository,
};

struct PromptEnv {
    #[allow(dead_code)]
    data_dir: TempDir,
    vectors: Arc<InMemoryVectorStore>,
    embedder: Arc<MockEmbedding>,
    snapshots: Arc<SnapshotStore>,
    ltr: Arc<LtrStore>,
}

impl PromptEnv {
    async fn new() -> Self {
        let data_dir = TempDir::new().unwrap();
        let env = Self {
            vectors: Arc::new(InMemoryVectorStore::new()),
            embedder: Arc::new(MockEmbedding::new()),
            snapshots: Arc::new(SnapshotStore::new()),
            ltr: Arc::new(LtrStore::new(data_dir.path())),
            data_dir,
        };
        env.snapshots.publish(IndexSnapshot::new("repo-p")).await;
        env
    }

    async fn seed_chunks(&self, count: usize, code_chars: usize) {
        let mut entities = Vec::new();
        for i in 0..count {
            let mut code = format!("def handler_{}(request):\n", i);
            while code.len() < code_chars {
                code.push_str(&format!("    data_{} = request.field_{}\n", i, code.len()));
            }
            // Equal-sized blocks keep the greedy packer's choice a prefix.
            code.truncate(code_chars);
            let entity = CodeEntity::chunk_entity(
                "repo-p",
                &format!("handlers/h{}.py", i),
                format!("handler_{}", i),
                code,
                Language::Python,
                0,
                12,
            );
            let embedding = self.embedder.embed_entity(&entity).await.unwrap();
            entities.push(entity.with_embedding(embedding));
        }
        self.vectors.upsert(entities).await.unwrap();
    }

    fn retriever(&self) -> Arc<RetrieveContextUseCase> {
        Arc::new(RetrieveContextUseCase::new(
            self.vectors.clone(),
            self.embedder.clone(),
            self.snapshots.clone(),
            self.ltr.clone(),
        ))
    }

    fn assembler(&self) -> AssemblePromptUseCase {
        AssemblePromptUseCase::new(
            self.retriever(),
            self.vectors.clone(),
            self.embedder.clone(),
            self.snapshots.clone(),
        )
    }
}

#[tokio::test]
async fn test_budget_is_never_exceeded() {
    let env = PromptEnv::new().await;
    env.seed_chunks(10, 400).await;

    let context = ContextRequest::new("handle incoming request").with_max_chunks(10);
    let request = PromptRequest::new(context)
        .with_budget(350)
        .without_dependency_expansion()
        .without_file_summaries();

    let response = env.assembler().execute("repo-p", &request).await.unwrap();

    assert!(response.token_usage.estimated_tokens <= 350);
    // System + task, then at most three ~100-token chunk blocks.
    let chunk_messages = response.messages.len() - 2;
    assert!(chunk_messages <= 3, "got {} chunk messages", chunk_messages);
    assert_eq!(response.token_usage.chunks_included, chunk_messages);
    assert_eq!(response.token_usage.budget, 350);
}

#[tokio::test]
async fn test_selected_chunks_preserve_rank_order() {
    let env = PromptEnv::new().await;
    env.seed_chunks(10, 400).await;

    let context = ContextRequest::new("handle incoming request").with_max_chunks(10);
    let ranked = env
        .retriever()
        .execute("repo-p", &context)
        .await
        .unwrap();
    let rank_order: Vec<String> = ranked.chunks.iter().map(|c| c.chunk_id.clone()).collect();

    let request = PromptRequest::new(context)
        .with_budget(350)
        .without_dependency_expansion()
        .without_file_summaries();
    let response = env.assembler().execute("repo-p", &request).await.unwrap();

    // Selected ids appear in the ranker's order (an order-preserving
    // subsequence, and under this uniform chunk size specifically the
    // prefix).
    let mut last_position = 0usize;
    for selected in &response.selected_chunks {
        let position = rank_order
            .iter()
            .position(|id| id == &selected.id)
            .expect("selected chunk came from the ranking");
        assert!(position >= last_position);
        last_position = position + 1;
    }
    let prefix: Vec<String> = rank_order
        .iter()
        .take(response.selected_chunks.len())
        .cloned()
        .collect();
    let selected_ids: Vec<String> = response
        .selected_chunks
        .iter()
        .map(|s| s.id.clone())
        .collect();
    assert_eq!(selected_ids, prefix);
}

#[tokio::test]
async fn test_generous_budget_includes_everything_once() {
    let env = PromptEnv::new().await;
    env.seed_chunks(4, 200).await;

    let context = ContextRequest::new("handle incoming request").with_max_chunks(10);
    let request = PromptRequest::new(context)
        .with_budget(20_000)
        .without_dependency_expansion();

    let response = env.assembler().execute("repo-p", &request).await.unwrap();
    assert_eq!(response.selected_chunks.len(), 4);

    let mut ids: Vec<&str> = response.selected_chunks.iter().map(|s| s.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4, "no chunk message is duplicated");

    // Per-file summaries precede the chunk blocks.
    let summary_messages: Vec<&str> = response
        .messages
        .iter()
        .filter(|m| m.content.starts_with("File: ") && m.content.contains("Functions:"))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(summary_messages.len(), 4);
}
