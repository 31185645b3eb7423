mod embedding_service;
mod git_host;
mod llm_gateway;
mod parser_service;
mod reranking_service;
mod vector_repository;

pub use embedding_service::EmbeddingService;
pub use git_host::{CreatePullRequest, GitHost, PullRequestInfo};
pub use llm_gateway::{ChatMessage, ChatOptions, LlmGateway};
pub use parser_service::ParserService;
pub use reranking_service::{rerank_pair_text, RerankingService};
pub use vector_repository::{SearchFilters, VectorRepository};
