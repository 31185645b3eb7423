use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::application::{
    ApplyPatchUseCase, AssemblePromptUseCase, DeleteRepositoryUseCase, EmbeddingService, GitHost,
    IndexRepositoryUseCase, LlmGateway, MergeTraceUseCase, RerankingService,
    RetrieveContextUseCase, SubmitFeedbackUseCase, VectorRepository,
};
use crate::config::Settings;
use crate::connector::adapter::{
    GatewayEmbedding, GitAnalyzer, GitCli, GithubHubClient, HttpLlmGateway, InMemoryVectorStore,
    MockEmbedding, MockReranking, TreeSitterParser,
};
use crate::connector::storage::{
    JobStore, LtrStore, MetadataStore, RepositoryStore, ResponseCache, SnapshotStore,
};
use crate::domain::Repository;

pub struct ContainerConfig {
    pub data_dir: String,
    pub mock_embeddings: bool,
    pub no_rerank: bool,
    pub show_progress: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            mock_embeddings: true,
            no_rerank: false,
            show_progress: false,
        }
    }
}

/// Wires adapters and stores into use cases for the CLI.
pub struct Container {
    settings: Settings,
    repository_store: Arc<RepositoryStore>,
    job_store: Arc<JobStore>,
    snapshot_store: Arc<SnapshotStore>,
    metadata_store: Arc<MetadataStore>,
    ltr_store: Arc<LtrStore>,
    cache: Arc<ResponseCache>,
    parser: Arc<TreeSitterParser>,
    embedder: Arc<dyn EmbeddingService>,
    reranker: Option<Arc<dyn RerankingService>>,
    llm_gateway: Option<Arc<dyn LlmGateway>>,
    git_host: Option<Arc<dyn GitHost>>,
    vector_repo: Arc<dyn VectorRepository>,
    git: GitCli,
    show_progress: bool,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let settings = Settings::from_env().with_data_dir(config.data_dir.clone());
        std::fs::create_dir_all(&settings.data_dir)?;

        let repository_store = Arc::new(RepositoryStore::new(&settings.data_dir));
        let job_store = Arc::new(JobStore::new());
        let snapshot_store = Arc::new(SnapshotStore::new());
        let metadata_store = Arc::new(MetadataStore::new(settings.index_meta_dir()));
        let ltr_store = Arc::new(LtrStore::new(settings.ltr_dir()));
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(
            settings.cache_ttl_secs,
        )));

        // Persisted metadata is the source of truth across restarts.
        let mut restored = 0usize;
        for metadata in metadata_store.load_all() {
            snapshot_store.publish(metadata.into_snapshot()).await;
            restored += 1;
        }
        if restored > 0 {
            info!("Restored {} index snapshots from disk", restored);
        }

        let parser = Arc::new(TreeSitterParser::new());

        let embedder: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            Arc::new(MockEmbedding::with_dimensions(settings.embedding_dimensions))
        } else {
            debug!("Using gateway embedding service");
            Arc::new(GatewayEmbedding::new(
                settings.llm_gateway_url.clone(),
                settings.embedding_model.clone(),
                settings.embedding_dimensions,
            ))
        };

        // The cross-encoder is optional; with no model configured the
        // retriever simply skips the pass.
        let reranker: Option<Arc<dyn RerankingService>> =
            if settings.reranker_enabled && !config.no_rerank {
                Some(Arc::new(MockReranking::new()))
            } else {
                None
            };

        let llm_gateway: Option<Arc<dyn LlmGateway>> = settings.llm_gateway_enabled.then(|| {
            Arc::new(HttpLlmGateway::new(
                settings.llm_gateway_url.clone(),
                settings.llm_gateway_model.clone(),
            )) as Arc<dyn LlmGateway>
        });

        let git_host: Option<Arc<dyn GitHost>> = settings.github_hub_enabled.then(|| {
            Arc::new(GithubHubClient::new(
                settings.github_hub_url.clone(),
                settings.github_default_conn.clone(),
            )) as Arc<dyn GitHost>
        });

        let vector_repo: Arc<dyn VectorRepository> = Arc::new(InMemoryVectorStore::new());
        let git = GitCli::new(Duration::from_secs(settings.git_timeout_secs));

        Ok(Self {
            settings,
            repository_store,
            job_store,
            snapshot_store,
            metadata_store,
            ltr_store,
            cache,
            parser,
            embedder,
            reranker,
            llm_gateway,
            git_host,
            vector_repo,
            git,
            show_progress: config.show_progress,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn repository_store(&self) -> Arc<RepositoryStore> {
        self.repository_store.clone()
    }

    pub fn job_store(&self) -> Arc<JobStore> {
        self.job_store.clone()
    }

    pub fn vector_repo(&self) -> Arc<dyn VectorRepository> {
        self.vector_repo.clone()
    }

    /// Find a repository by local path, registering it when new.
    pub async fn register_repository(
        &self,
        path: &str,
        name: Option<&str>,
    ) -> Result<Repository> {
        let absolute = Path::new(path)
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("Invalid path {}: {}", path, e))?;
        let path_str = absolute.to_string_lossy().to_string();

        if let Some(existing) = self.repository_store.find_by_path(&path_str).await {
            return Ok(existing);
        }

        let repo_name = name.map(String::from).unwrap_or_else(|| {
            absolute
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string()
        });
        let repository = Repository::new(repo_name, path_str);
        self.repository_store.save(repository.clone()).await?;
        Ok(repository)
    }

    pub fn index_use_case(&self) -> IndexRepositoryUseCase {
        let use_case = IndexRepositoryUseCase::new(
            self.repository_store.clone(),
            self.job_store.clone(),
            self.snapshot_store.clone(),
            self.metadata_store.clone(),
            self.vector_repo.clone(),
            self.parser.clone(),
            self.embedder.clone(),
            Arc::new(GitAnalyzer::new(self.git.clone())),
            self.cache.clone(),
        );
        if self.show_progress {
            use_case.with_progress()
        } else {
            use_case
        }
    }

    pub fn retrieve_use_case(&self) -> Arc<RetrieveContextUseCase> {
        let mut use_case = RetrieveContextUseCase::new(
            self.vector_repo.clone(),
            self.embedder.clone(),
            self.snapshot_store.clone(),
            self.ltr_store.clone(),
        )
        .with_reranker_topk(self.settings.reranker_topk);
        if let Some(ref reranker) = self.reranker {
            use_case = use_case.with_reranker(reranker.clone());
        }
        if let Some(ref gateway) = self.llm_gateway {
            use_case = use_case.with_llm_gateway(gateway.clone());
        }
        Arc::new(use_case)
    }

    pub fn prompt_use_case(&self) -> AssemblePromptUseCase {
        let mut use_case = AssemblePromptUseCase::new(
            self.retrieve_use_case(),
            self.vector_repo.clone(),
            self.embedder.clone(),
            self.snapshot_store.clone(),
        );
        if let Some(ref gateway) = self.llm_gateway {
            use_case = use_case.with_llm_gateway(gateway.clone());
        }
        use_case
    }

    pub fn apply_patch_use_case(&self) -> ApplyPatchUseCase {
        let mut use_case = ApplyPatchUseCase::new(self.repository_store.clone(), self.git.clone());
        if let Some(ref host) = self.git_host {
            use_case = use_case.with_git_host(host.clone());
        }
        use_case
    }

    pub fn feedback_use_case(&self) -> SubmitFeedbackUseCase {
        SubmitFeedbackUseCase::new(self.snapshot_store.clone(), self.ltr_store.clone())
    }

    pub fn trace_use_case(&self) -> MergeTraceUseCase {
        MergeTraceUseCase::new(self.snapshot_store.clone(), self.metadata_store.clone())
    }

    pub fn delete_use_case(&self) -> DeleteRepositoryUseCase {
        DeleteRepositoryUseCase::new(
            self.repository_store.clone(),
            self.snapshot_store.clone(),
            self.metadata_store.clone(),
            self.ltr_store.clone(),
            self.vector_repo.clone(),
        )
    }
}
