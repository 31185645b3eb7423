use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::application::{EmbeddingService, ParserService, VectorRepository};
use crate::connector::adapter::GitAnalyzer;
use crate::connector::storage::{JobStore, MetadataStore, RepositoryStore, ResponseCache, SnapshotStore};
use crate::domain::{
    compute_signature, resolve_import, CodeEntity, DependencyGraph, DomainError, IndexJob,
    IndexMetadata, IndexSnapshot, ParsedFile,
};

/// Chunk text stored in the vector store is capped at this many characters.
const CHUNK_CODE_CAP: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub job_id: String,
    pub repo_id: String,
    pub files_processed: usize,
    pub entities_indexed: usize,
    pub unique_signatures: usize,
    pub duplicate_definitions: u64,
    pub dependency_edges: usize,
    pub cycles: usize,
    pub language_stats: HashMap<String, u64>,
}

/// The repository ingest pipeline: parse → graphs → git signals →
/// signatures → embeddings → one vector-store batch → snapshot publish →
/// metadata persist.
///
/// Any failure marks the job failed and leaves the previous snapshot and
/// persisted metadata untouched.
pub struct IndexRepositoryUseCase {
    repository_store: Arc<RepositoryStore>,
    job_store: Arc<JobStore>,
    snapshot_store: Arc<SnapshotStore>,
    metadata_store: Arc<MetadataStore>,
    vector_repo: Arc<dyn VectorRepository>,
    parser: Arc<dyn ParserService>,
    embedder: Arc<dyn EmbeddingService>,
    git_analyzer: Arc<GitAnalyzer>,
    cache: Arc<ResponseCache>,
    show_progress: bool,
}

impl IndexRepositoryUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_store: Arc<RepositoryStore>,
        job_store: Arc<JobStore>,
        snapshot_store: Arc<SnapshotStore>,
        metadata_store: Arc<MetadataStore>,
        vector_repo: Arc<dyn VectorRepository>,
        parser: Arc<dyn ParserService>,
        embedder: Arc<dyn EmbeddingService>,
        git_analyzer: Arc<GitAnalyzer>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            repository_store,
            job_store,
            snapshot_store,
            metadata_store,
            vector_repo,
            parser,
            embedder,
            git_analyzer,
            cache,
            show_progress: false,
        }
    }

    /// Render an indicatif bar while embedding (CLI runs).
    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }

    pub async fn execute(&self, repo_id: &str) -> Result<IndexReport, DomainError> {
        let mut repository = self
            .repository_store
            .get(repo_id)
            .await
            .ok_or_else(|| DomainError::not_found(format!("repository {}", repo_id)))?;

        let job = self.job_store.create(repo_id).await?;

        repository.mark_indexing();
        self.repository_store.save(repository.clone()).await?;

        match self.run_pipeline(&job, repo_id, repository.local_path()).await {
            Ok(report) => {
                self.job_store.update(job.id(), IndexJob::complete).await?;
                repository.mark_indexed();
                self.repository_store.save(repository).await?;
                self.cache.bump_version(repo_id).await;
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                self.job_store
                    .update(job.id(), |j| j.fail(message.clone()))
                    .await?;
                repository.mark_failed();
                self.repository_store.save(repository).await?;
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        job: &IndexJob,
        repo_id: &str,
        repo_path: &str,
    ) -> Result<IndexReport, DomainError> {
        let start_time = Instant::now();
        let root = Path::new(repo_path);

        info!("Indexing repository {} at {}", repo_id, repo_path);
        let (parsed_files, language_stats) = self.parser.parse_repository(root).await?;
        let total_files = parsed_files.len() as u64;
        info!("Parsed {} source files", total_files);

        self.job_store
            .update(job.id(), |j| j.start(total_files))
            .await?;

        let mut snapshot = IndexSnapshot::new(repo_id);
        snapshot.dependency_graph = build_dependency_graph(&parsed_files);
        snapshot.centrality = snapshot.dependency_graph.centrality();
        snapshot.cycles = snapshot.dependency_graph.cycles();
        if !snapshot.cycles.is_empty() {
            warn!(
                "Repository {} has {} circular import groups",
                repo_id,
                snapshot.cycles.len()
            );
        }

        let file_paths: Vec<String> = parsed_files.iter().map(|f| f.file_path.clone()).collect();
        let git_signals = self.git_analyzer.analyze(root, &file_paths).await;
        snapshot.recency = git_signals.recency;
        snapshot.history = git_signals.history;
        snapshot.comodification = git_signals.comodification;

        let progress_bar = if self.show_progress {
            let bar = ProgressBar::new(total_files);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                    .expect("Invalid progress bar template")
                    .progress_chars("━━─"),
            );
            Some(bar)
        } else {
            None
        };

        let mut entities: Vec<CodeEntity> = Vec::new();
        for (index, file) in parsed_files.iter().enumerate() {
            if let Some(ref bar) = progress_bar {
                bar.set_message(file.file_path.clone());
            }

            self.collect_entities(repo_id, file, &mut snapshot, &mut entities)
                .await?;

            self.job_store
                .update(job.id(), |j| j.advance(index as u64 + 1))
                .await?;
            if let Some(ref bar) = progress_bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = progress_bar {
            bar.finish_and_clear();
        }

        let entities_indexed = entities.len();
        debug!("Upserting {} entities in one batch", entities_indexed);
        // One batch per ingest: partial failure fails the job before any
        // snapshot or metadata becomes visible.
        self.vector_repo.upsert(entities).await?;

        self.metadata_store.save(&IndexMetadata::from_snapshot(&snapshot))?;
        let unique_signatures = snapshot.signature_counts.len();
        let duplicate_definitions = snapshot
            .signature_counts
            .values()
            .map(|c| c.saturating_sub(1))
            .sum();
        let dependency_edges = snapshot.dependency_graph.edge_count();
        let cycles = snapshot.cycles.len();
        self.snapshot_store.publish(snapshot).await;

        info!(
            "Indexing complete: {} files, {} entities in {:.2}s",
            total_files,
            entities_indexed,
            start_time.elapsed().as_secs_f64()
        );

        Ok(IndexReport {
            job_id: job.id().to_string(),
            repo_id: repo_id.to_string(),
            files_processed: total_files as usize,
            entities_indexed,
            unique_signatures,
            duplicate_definitions,
            dependency_edges,
            cycles,
            language_stats,
        })
    }

    /// Build and embed the file, function, class and chunk entities for one
    /// parsed file. Functions and classes collapse by signature: only the
    /// first occurrence is indexed, later ones just increment the count.
    async fn collect_entities(
        &self,
        repo_id: &str,
        file: &ParsedFile,
        snapshot: &mut IndexSnapshot,
        entities: &mut Vec<CodeEntity>,
    ) -> Result<(), DomainError> {
        let file_entity = CodeEntity::file_entity(
            repo_id,
            &file.file_path,
            file.language,
            file.lines_of_code,
        );
        entities.push(self.embed(file_entity).await?);

        for function in &file.functions {
            let sig = compute_signature(&function.code, Some(&function.name));
            let count = snapshot.signature_counts.entry(sig.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                continue;
            }
            let entity = CodeEntity::function_entity(
                repo_id,
                &file.file_path,
                &function.name,
                function.code.clone(),
                file.language,
                function.start_line,
                function.end_line,
            );
            snapshot
                .signature_representative
                .insert(sig, entity.id().to_string());
            entities.push(self.embed(entity).await?);
        }

        for class in &file.classes {
            let sig = compute_signature(&class.code, Some(&class.name));
            let count = snapshot.signature_counts.entry(sig.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                continue;
            }
            let entity = CodeEntity::class_entity(
                repo_id,
                &file.file_path,
                &class.name,
                class.code.clone(),
                file.language,
                class.start_line,
                class.end_line,
            );
            snapshot
                .signature_representative
                .insert(sig, entity.id().to_string());
            entities.push(self.embed(entity).await?);
        }

        // Chunks are never signature-deduped at index time. AST regions are
        // named after the entity they cover so query-time dedup can match
        // them against the recorded entity signatures.
        for (index, chunk) in file.chunks.iter().enumerate() {
            let code: String = chunk.code.chars().take(CHUNK_CODE_CAP).collect();
            let name = chunk
                .entities
                .first()
                .map(|(_, name)| name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("chunk_{}", index));
            let entity = CodeEntity::chunk_entity(
                repo_id,
                &file.file_path,
                name,
                code,
                file.language,
                chunk.start_line,
                chunk.end_line,
            );
            entities.push(self.embed(entity).await?);
        }

        Ok(())
    }

    async fn embed(&self, entity: CodeEntity) -> Result<CodeEntity, DomainError> {
        let vector = self.embedder.embed_entity(&entity).await?;
        Ok(entity.with_embedding(vector))
    }
}

/// Nodes first, then edges from each file's resolved imports; an edge is
/// kept only when the resolved target is itself a parsed file.
fn build_dependency_graph(parsed_files: &[ParsedFile]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for file in parsed_files {
        graph.add_file(&file.file_path);
    }
    for file in parsed_files {
        for import in &file.imports {
            if let Some(target) = resolve_import(import, &file.file_path, file.language) {
                if graph.has_node(&target) && target != file.file_path {
                    graph.add_import(&file.file_path, &target);
                }
            }
        }
    }
    graph
}
