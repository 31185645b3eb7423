use serde::{Deserialize, Serialize};

const WEIGHT_FLOOR: f64 = 0.05;
const WEIGHT_CEIL: f64 = 0.8;
const NUDGE_RATE: f64 = 0.05;

/// Per-repo ranking weights. Always normalized to sum 1 with each component
/// clamped to `[0.05, 0.8]` after a feedback nudge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    pub semantic: f64,
    pub dependency: f64,
    pub history: f64,
    pub recency: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            semantic: 0.4,
            dependency: 0.3,
            history: 0.2,
            recency: 0.1,
        }
    }
}

impl RankWeights {
    pub fn sum(&self) -> f64 {
        self.semantic + self.dependency + self.history + self.recency
    }

    /// Apply a feedback nudge: dependency follows the centrality gap between
    /// relevant and irrelevant files, recency follows the recency gap.
    pub fn nudge(&mut self, centrality_delta: f64, recency_delta: f64) {
        self.dependency = (self.dependency + NUDGE_RATE * centrality_delta)
            .clamp(WEIGHT_FLOOR, WEIGHT_CEIL);
        self.recency =
            (self.recency + NUDGE_RATE * recency_delta).clamp(WEIGHT_FLOOR, WEIGHT_CEIL);
        self.renormalize();
    }

    pub fn renormalize(&mut self) {
        let total = self.sum();
        if total > 0.0 {
            self.semantic /= total;
            self.dependency /= total;
            self.history /= total;
            self.recency /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let w = RankWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-9);
        assert_eq!(w.semantic, 0.4);
    }

    #[test]
    fn test_positive_centrality_gap_raises_dependency() {
        let mut w = RankWeights::default();
        w.nudge(0.6, -0.4);
        assert!(w.dependency > 0.3 / w.sum() - 1e-9);
        assert!((w.sum() - 1.0).abs() < 1e-9);
        for v in [w.semantic, w.dependency, w.history, w.recency] {
            assert!(v >= WEIGHT_FLOOR - 1e-9 && v <= WEIGHT_CEIL + 1e-9);
        }
    }

    #[test]
    fn test_nudge_respects_floor() {
        let mut w = RankWeights::default();
        for _ in 0..100 {
            w.nudge(-1.0, -1.0);
        }
        // The floor is applied before renormalization.
        assert!(w.recency > 0.0);
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }
}
