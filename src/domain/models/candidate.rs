use serde::{Deserialize, Serialize};

use super::CodeEntity;

/// One transparency entry attached to a ranked candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reason {
    #[serde(rename = "type")]
    pub kind: String,
    pub score: f32,
    pub explanation: String,
}

impl Reason {
    pub fn new(kind: impl Into<String>, score: f32, explanation: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            score,
            explanation: explanation.into(),
        }
    }
}

/// A retrieval candidate flowing through the ranking pipeline.
///
/// `distance` is the normalized vector distance (smaller is closer). Stores
/// that report a similarity score instead populate `raw_score` and leave
/// `distance` unset until [`Candidate::normalize`] runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub entity: CodeEntity,
    pub distance: Option<f32>,
    pub raw_score: Option<f32>,
    pub confidence: u32,
    pub reasons: Vec<Reason>,
}

impl Candidate {
    pub fn with_distance(entity: CodeEntity, distance: f32) -> Self {
        Self {
            entity,
            distance: Some(distance),
            raw_score: None,
            confidence: 0,
            reasons: Vec::new(),
        }
    }

    pub fn with_raw_score(entity: CodeEntity, score: f32) -> Self {
        Self {
            entity,
            distance: None,
            raw_score: Some(score),
            confidence: 0,
            reasons: Vec::new(),
        }
    }

    /// Guarantee a bounded `distance`.
    ///
    /// A score in `[0, 1]` is treated as a similarity and inverted. A score
    /// above 1 is ambiguous; it is taken as a raw distance and the candidate
    /// carries a `normalization` reason recording the assumption. With
    /// neither field present the distance defaults to 0.5.
    pub fn normalize(&mut self) {
        if let Some(d) = self.distance {
            if d.is_finite() {
                return;
            }
        }
        let dist = match self.raw_score {
            Some(score) if (0.0..=1.0).contains(&score) => 1.0 - score,
            Some(score) if score.is_finite() => {
                self.reasons.push(Reason::new(
                    "normalization",
                    0.0,
                    format!("Score {:.3} > 1 treated as raw distance", score),
                ));
                score
            }
            _ => 0.5,
        };
        self.distance = Some(dist);
    }

    /// Normalized distance; callers run [`Candidate::normalize`] first.
    pub fn distance(&self) -> f32 {
        self.distance.unwrap_or(0.5)
    }

    /// Semantic closeness in `[0, 1]`.
    pub fn semantic(&self) -> f32 {
        1.0 - self.distance().clamp(0.0, 1.0)
    }

    /// Shrink the distance by `delta`, flooring at zero. Used to promote
    /// preferred files and agentic additions.
    pub fn promote(&mut self, delta: f32) {
        self.distance = Some((self.distance() - delta).max(0.0));
    }

    /// Identifier used for unique-chunk selection: the chunk id when
    /// present, the entity id otherwise.
    pub fn selection_id(&self) -> &str {
        if self.entity.chunk_id().is_empty() {
            self.entity.id()
        } else {
            self.entity.chunk_id()
        }
    }

    pub fn snippet(&self, max_chars: usize) -> String {
        let code = self.entity.code();
        let end = code
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(code.len());
        code[..end].to_string()
    }
}
