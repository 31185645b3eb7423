//! CodeContext CLI - retrieval-augmented code context engine.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use codecontext::{
    ApplyPatchRequest, Container, ContainerConfig, ContextRequest, FeedbackRequest, PromptRequest,
    RetrievalMode, SerializedGraph, SliceDirection, VectorRepository,
};

/// CodeContext - multi-signal code retrieval and safe patch application
#[derive(Parser)]
#[command(name = "codecontext")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the data directory
    #[arg(short, long, global = true, default_value = "./data")]
    data_dir: String,

    /// Embed through the LLM gateway instead of the deterministic mock
    #[arg(long, global = true)]
    gateway_embeddings: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register and index a repository
    Index {
        /// Path to the repository
        path: String,

        /// Optional name for the repository
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Retrieve ranked code context for a task
    Context {
        /// Repository id
        repo: String,

        /// The task or question
        query: String,

        /// Maximum chunks to return
        #[arg(long, default_value = "8")]
        max_chunks: usize,

        /// Retrieval mode: vector, callgraph or slice
        #[arg(long, default_value = "vector")]
        mode: String,

        /// Call-graph expansion depth
        #[arg(long, default_value = "2")]
        depth: usize,

        /// Seed symbol for slice mode
        #[arg(long)]
        slice_target: Option<String>,

        /// Slice direction: forward or backward
        #[arg(long, default_value = "forward")]
        slice_direction: String,

        /// Pull nearby chunks from selected files
        #[arg(long)]
        expand_neighbors: bool,

        /// Ask the LLM which files are missing (bounded loop)
        #[arg(long)]
        agentic: bool,

        /// Filter by language
        #[arg(short = 'L', long)]
        language: Option<Vec<String>>,
    },

    /// Assemble a token-budgeted prompt package
    Prompt {
        repo: String,
        query: String,

        #[arg(long, default_value = "2200")]
        max_tokens: usize,

        #[arg(long, default_value = "12")]
        max_chunks: usize,
    },

    /// Validate and apply a unified diff through a worktree
    ApplyPatch {
        repo: String,

        /// Path to the patch file
        patch_file: String,

        #[arg(long)]
        base_branch: Option<String>,

        #[arg(long)]
        commit_message: Option<String>,

        /// Validate and dry-run only
        #[arg(long)]
        dry_run: bool,

        /// Push the new branch to origin
        #[arg(long)]
        push: bool,

        /// Only these files may be touched
        #[arg(long)]
        restrict: Option<Vec<String>>,
    },

    /// Record relevance feedback to nudge ranking weights
    Feedback {
        repo: String,

        #[arg(long)]
        relevant: Vec<String>,

        #[arg(long)]
        irrelevant: Vec<String>,
    },

    /// Merge a dynamic call-graph trace (JSON) into the index
    Trace {
        repo: String,

        /// Path to a {nodes, edges} JSON document
        trace_file: String,
    },

    /// List registered repositories
    List,

    /// Delete a repository and its derived data
    Delete {
        repo: String,
    },

    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let container = Container::new(ContainerConfig {
        data_dir: cli.data_dir.clone(),
        mock_embeddings: !cli.gateway_embeddings,
        no_rerank: false,
        show_progress: true,
    })
    .await?;

    match cli.command {
        Commands::Index { path, name } => {
            let repository = container.register_repository(&path, name.as_deref()).await?;
            let report = container.index_use_case().execute(repository.id()).await?;
            println!(
                "Indexed {} ({}): {} files, {} entities, {} duplicate definitions collapsed",
                repository.name(),
                report.repo_id,
                report.files_processed,
                report.entities_indexed,
                report.duplicate_definitions
            );
            if report.cycles > 0 {
                println!("  {} circular import groups detected", report.cycles);
            }
        }

        Commands::Context {
            repo,
            query,
            max_chunks,
            mode,
            depth,
            slice_target,
            slice_direction,
            expand_neighbors,
            agentic,
            language,
        } => {
            let mut request = ContextRequest::new(&query).with_max_chunks(max_chunks);
            request.retrieval_mode = match mode.as_str() {
                "callgraph" => RetrievalMode::Callgraph,
                "slice" => RetrievalMode::Slice,
                _ => RetrievalMode::Vector,
            };
            request.call_graph_depth = depth;
            request.slice_depth = depth;
            request.slice_target = slice_target;
            request.slice_direction = if slice_direction == "backward" {
                SliceDirection::Backward
            } else {
                SliceDirection::Forward
            };
            request.expand_neighbors = expand_neighbors;
            if agentic {
                request.agentic = true;
                request.max_agentic_iters = container.settings().agentic_max_iters;
            }
            if let Some(languages) = language {
                request.languages = languages;
            }

            let response = container.retrieve_use_case().execute(&repo, &request).await?;

            if response.chunks.is_empty() {
                println!("No matching code regions found.");
            } else {
                for (i, chunk) in response.chunks.iter().enumerate() {
                    println!(
                        "{}. {}:{}-{} ({}%, {})",
                        i + 1,
                        chunk.file_path,
                        chunk.start_line,
                        chunk.end_line,
                        chunk.confidence,
                        chunk.language
                    );
                    for line in chunk.snippet.lines().take(3) {
                        println!("   | {}", line);
                    }
                    println!();
                }
                println!(
                    "{} chunks, avg confidence {:.1} ({} mode)",
                    response.summary.total_chunks,
                    response.summary.avg_confidence,
                    response.summary.retrieval_mode
                );
            }
            for artifact in &response.artifacts {
                println!("\n[{}]\n{}", artifact.label, artifact.content);
            }
        }

        Commands::Prompt {
            repo,
            query,
            max_tokens,
            max_chunks,
        } => {
            let context = ContextRequest::new(&query).with_max_chunks(max_chunks);
            let request = PromptRequest::new(context).with_budget(max_tokens);
            let response = container.prompt_use_case().execute(&repo, &request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::ApplyPatch {
            repo,
            patch_file,
            base_branch,
            commit_message,
            dry_run,
            push,
            restrict,
        } => {
            let patch = std::fs::read_to_string(&patch_file)?;
            let request = ApplyPatchRequest {
                patch,
                base_branch,
                commit_message,
                dry_run,
                push,
                enforce_restriction: restrict.is_some(),
                restrict_to_files: restrict.unwrap_or_default(),
                ..Default::default()
            };
            let response = container.apply_patch_use_case().execute(&repo, &request).await?;
            match response.commit {
                Some(ref sha) => println!(
                    "Applied on branch {} (commit {})",
                    response.new_branch, sha
                ),
                None => println!("Dry run ok: patch applies cleanly on {}", response.base_branch),
            }
            for file in &response.files_changed {
                println!("  {}", file);
            }
        }

        Commands::Feedback {
            repo,
            relevant,
            irrelevant,
        } => {
            let weights = container
                .feedback_use_case()
                .execute(
                    &repo,
                    &FeedbackRequest {
                        relevant_files: relevant,
                        irrelevant_files: irrelevant,
                    },
                )
                .await?;
            println!(
                "Updated weights: semantic {:.3}, dependency {:.3}, history {:.3}, recency {:.3}",
                weights.semantic, weights.dependency, weights.history, weights.recency
            );
        }

        Commands::Trace { repo, trace_file } => {
            let raw = std::fs::read_to_string(&trace_file)?;
            let trace: SerializedGraph = serde_json::from_str(&raw)?;
            let (nodes, edges) = container.trace_use_case().execute(&repo, &trace).await?;
            println!("Merged trace: {} nodes, {} edges", nodes, edges);
        }

        Commands::List => {
            let repos = container.repository_store().list().await;
            if repos.is_empty() {
                println!("No repositories registered.");
            } else {
                for repo in repos {
                    println!("  {} ({})", repo.name(), repo.id());
                    println!("    Path:   {}", repo.local_path());
                    println!("    Status: {:?}", repo.status());
                    println!();
                }
            }
        }

        Commands::Delete { repo } => {
            let removed = container.delete_use_case().execute(&repo).await?;
            println!("Deleted repository ({} vector entities removed).", removed);
        }

        Commands::Stats => {
            let repos = container.repository_store().list().await;
            let mut total_entities = 0u64;
            for repo in &repos {
                total_entities += container.vector_repo().count_entities(repo.id()).await?;
            }
            println!("CodeContext Statistics");
            println!("======================");
            println!("Repositories: {}", repos.len());
            println!("Entities:     {}", total_entities);
            println!("Data Dir:     {}", cli.data_dir);
        }
    }

    Ok(())
}
