mod gateway_embedding;
mod git_analyzer;
mod git_cli;
mod github_hub_client;
mod in_memory_vector_store;
mod llm_gateway_client;
mod mock_embedding;
mod mock_reranking;
mod treesitter_parser;

pub use gateway_embedding::GatewayEmbedding;
pub use git_analyzer::{GitAnalyzer, GitSignals};
pub use git_cli::{GitCli, GitOutput, TIMEOUT_EXIT_CODE};
pub use github_hub_client::GithubHubClient;
pub use in_memory_vector_store::InMemoryVectorStore;
pub use llm_gateway_client::HttpLlmGateway;
pub use mock_embedding::MockEmbedding;
pub use mock_reranking::{MockReranking, NoopReranking};
pub use treesitter_parser::TreeSitterParser;
