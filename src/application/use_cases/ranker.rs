use std::collections::HashMap;

use crate::domain::{Candidate, RankWeights, Reason};

/// Weighted multi-signal scoring over normalized candidates.
///
/// The output is always a permutation of the input: scoring mutates
/// confidence and reasons, then sorts descending by score. The stable sort
/// keeps the upstream order for ties, which lets the cross-encoder's
/// ordering survive weight ties.
#[derive(Debug, Default, Clone)]
pub struct Ranker {
    weights: RankWeights,
}

impl Ranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use per-repo learned weights instead of the defaults.
    pub fn with_weights(weights: RankWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> RankWeights {
        self.weights
    }

    pub fn rank(
        &self,
        mut candidates: Vec<Candidate>,
        centrality: &HashMap<String, f64>,
        history: &HashMap<String, f64>,
        recency: &HashMap<String, f64>,
    ) -> Vec<Candidate> {
        let mut scored: Vec<(f64, usize, Candidate)> = candidates
            .drain(..)
            .enumerate()
            .map(|(position, mut candidate)| {
                candidate.normalize();
                let file = candidate.entity.file_path();
                let semantic = candidate.semantic() as f64;
                let dependency = centrality.get(file).copied().unwrap_or(0.0);
                let hist = history.get(file).copied().unwrap_or(0.0);
                let rec = recency.get(file).copied().unwrap_or(0.0);

                let score = self.weights.semantic * semantic
                    + self.weights.dependency * dependency
                    + self.weights.history * hist
                    + self.weights.recency * rec;

                candidate.confidence = (score * 100.0).round().clamp(0.0, 100.0) as u32;

                if semantic > 0.0 {
                    candidate.reasons.push(Reason::new(
                        "semantic",
                        semantic as f32,
                        "Semantically similar to the query",
                    ));
                }
                if dependency > 0.0 {
                    candidate.reasons.push(Reason::new(
                        "dependency",
                        dependency as f32,
                        "Central file in the import graph",
                    ));
                }
                if hist > 0.0 {
                    candidate.reasons.push(Reason::new(
                        "history",
                        hist as f32,
                        "Frequently changed over the last year",
                    ));
                }
                if rec > 0.0 {
                    candidate.reasons.push(Reason::new(
                        "recency",
                        rec as f32,
                        "Recently modified",
                    ));
                }

                (score, position, candidate)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.into_iter().map(|(_, _, c)| c).collect()
    }
}
