use serde::{Deserialize, Serialize};

use super::Reason;

/// How candidates are gathered before ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Vector,
    Callgraph,
    Slice,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Vector => "vector",
            RetrievalMode::Callgraph => "callgraph",
            RetrievalMode::Slice => "slice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceDirection {
    #[default]
    Forward,
    Backward,
}

/// A retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    pub query: String,
    pub max_chunks: usize,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub retrieval_mode: RetrievalMode,
    #[serde(default = "default_depth")]
    pub call_graph_depth: usize,
    #[serde(default)]
    pub slice_target: Option<String>,
    #[serde(default)]
    pub slice_direction: SliceDirection,
    #[serde(default = "default_depth")]
    pub slice_depth: usize,
    #[serde(default)]
    pub expand_neighbors: bool,
    #[serde(default)]
    pub agentic: bool,
    #[serde(default)]
    pub max_agentic_iters: usize,
    #[serde(default = "default_alpha")]
    pub hybrid_alpha: f32,
}

fn default_depth() -> usize {
    2
}

fn default_alpha() -> f32 {
    0.2
}

impl ContextRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_chunks: 8,
            languages: Vec::new(),
            retrieval_mode: RetrievalMode::Vector,
            call_graph_depth: 2,
            slice_target: None,
            slice_direction: SliceDirection::Forward,
            slice_depth: 2,
            expand_neighbors: false,
            agentic: false,
            max_agentic_iters: 0,
            hybrid_alpha: 0.2,
        }
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks.max(1);
        self
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.retrieval_mode = mode;
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_neighbors(mut self) -> Self {
        self.expand_neighbors = true;
        self
    }

    pub fn with_agentic(mut self, max_iters: usize) -> Self {
        self.agentic = true;
        self.max_agentic_iters = max_iters;
        self
    }

    pub fn with_slice(
        mut self,
        target: impl Into<String>,
        direction: SliceDirection,
        depth: usize,
    ) -> Self {
        self.retrieval_mode = RetrievalMode::Slice;
        self.slice_target = Some(target.into());
        self.slice_direction = direction;
        self.slice_depth = depth.max(1);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if self.max_chunks == 0 {
            return Err("max_chunks must be at least 1".to_string());
        }
        if self.max_agentic_iters > 2 {
            return Err("max_agentic_iters must be at most 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            return Err("hybrid_alpha must lie in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// One chunk in the retrieval response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub language: String,
    pub snippet: String,
    pub confidence: u32,
    pub reasons: Vec<Reason>,
    pub distance: f32,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub chunk_id: String,
}

/// A rendered diagram or agentic note shipped alongside chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub content: String,
}

impl Artifact {
    pub fn mermaid(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: "mermaid".to_string(),
            label: label.into(),
            content: content.into(),
        }
    }

    pub fn agentic(content: impl Into<String>) -> Self {
        Self {
            kind: "agentic".to_string(),
            label: "agentic_suggestions".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub total_chunks: usize,
    pub avg_confidence: f32,
    pub retrieval_mode: String,
    /// Signal sources that were unavailable for this response.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub degraded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub query: String,
    pub chunks: Vec<RetrievedChunk>,
    pub summary: ContextSummary,
    pub artifacts: Vec<Artifact>,
}
