mod candidate;
mod chunk;
mod entity;
mod graphs;
mod job;
mod language;
mod patch;
mod repository;
mod retrieval;
mod snapshot;
mod weights;

pub use candidate::{Candidate, Reason};
pub use chunk::{
    build_chunks, ChunkKind, ChunkSpan, ParsedEntity, ParsedFile, CHUNK_OVERLAP, CHUNK_WINDOW,
};
pub use entity::{CodeEntity, EntityType};
pub use graphs::{
    resolve_import, DependencyGraph, DependencyNeighbors, GraphEdge, GraphNode, SerializedGraph,
};
pub use job::{IndexJob, JobProgress, JobStatus};
pub use language::Language;
pub use patch::{
    parse_unified_diff, validate_patch, PatchFile, PatchValidation, MAX_PATCH_CHARS,
    MAX_PATCH_FILES,
};
pub use repository::{Repository, RepositoryStatus, SourceType};
pub use retrieval::{
    Artifact, ContextRequest, ContextResponse, ContextSummary, RetrievalMode, RetrievedChunk,
    SliceDirection,
};
pub use snapshot::{GraphEdges, IndexMetadata, IndexSnapshot};
pub use weights::RankWeights;
