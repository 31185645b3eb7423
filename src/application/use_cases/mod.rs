mod apply_patch;
mod assemble_prompt;
mod delete_repository;
mod hybrid;
mod index_repository;
mod merge_trace;
mod ranker;
mod retrieve_context;
mod submit_feedback;

pub use apply_patch::{ApplyPatchRequest, ApplyPatchResponse, ApplyPatchUseCase};
pub use assemble_prompt::{
    AssemblePromptUseCase, PromptRequest, PromptResponse, SelectedChunk, TokenUsage,
};
pub use delete_repository::DeleteRepositoryUseCase;
pub use hybrid::{hybrid_rerank, DEFAULT_HYBRID_ALPHA};
pub use index_repository::{IndexReport, IndexRepositoryUseCase};
pub use merge_trace::MergeTraceUseCase;
pub use ranker::Ranker;
pub use retrieve_context::RetrieveContextUseCase;
pub use submit_feedback::{FeedbackRequest, SubmitFeedbackUseCase};
