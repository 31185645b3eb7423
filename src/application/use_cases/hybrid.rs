use crate::domain::Candidate;

/// Default weight of the lexical leg in the hybrid blend.
pub const DEFAULT_HYBRID_ALPHA: f32 = 0.2;

const LEXICAL_BLOB_CHARS: usize = 4000;

/// Fraction of query terms (longer than two characters) found in `text`.
fn keyword_score(query: &str, text: &str) -> f32 {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect();
    if terms.is_empty() || text.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    (hits as f32 / terms.len() as f32).min(1.0)
}

/// Blend semantic closeness with lexical term overlap and re-sort
/// descending. The blend is `(1 − α)·semantic + α·lexical` over
/// `name + path + code` (code capped), with the incoming order preserved for
/// ties.
pub fn hybrid_rerank(mut candidates: Vec<Candidate>, query: &str, alpha: f32) -> Vec<Candidate> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut blended: Vec<(f32, usize, Candidate)> = candidates
        .drain(..)
        .enumerate()
        .map(|(position, mut candidate)| {
            candidate.normalize();
            let blob = format!(
                "{} {} {}",
                candidate.entity.name(),
                candidate.entity.file_path(),
                candidate.snippet(LEXICAL_BLOB_CHARS)
            );
            let lexical = keyword_score(query, &blob);
            let score = (1.0 - alpha) * candidate.semantic() + alpha * lexical;
            (score, position, candidate)
        })
        .collect();

    blended.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    blended.into_iter().map(|(_, _, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeEntity, EntityType, Language};

    fn candidate(file: &str, code: &str, distance: f32) -> Candidate {
        let entity = CodeEntity::new(
            format!("r:chunk:{}:0-9", file),
            "r".to_string(),
            file.to_string(),
            EntityType::Chunk,
            "chunk_0".to_string(),
            code.to_string(),
            Language::Python,
            0,
            9,
        );
        Candidate::with_distance(entity, distance)
    }

    #[test]
    fn test_keyword_score_counts_term_hits() {
        assert_eq!(keyword_score("user login flow", "def login(user): pass"), 2.0 / 3.0);
        assert_eq!(keyword_score("ab cd", "anything"), 0.0, "short terms ignored");
        assert_eq!(keyword_score("login", ""), 0.0);
    }

    #[test]
    fn test_lexical_match_can_flip_close_candidates() {
        let semantic_winner = candidate("misc.py", "unrelated helper", 0.40);
        let lexical_winner = candidate("auth.py", "def login(user, password): ...", 0.45);
        let out = hybrid_rerank(
            vec![semantic_winner, lexical_winner],
            "implement user login",
            0.5,
        );
        assert_eq!(out[0].entity.file_path(), "auth.py");
    }

    #[test]
    fn test_alpha_zero_keeps_semantic_order() {
        let a = candidate("a.py", "login login login", 0.2);
        let b = candidate("b.py", "nothing", 0.1);
        let out = hybrid_rerank(vec![a, b], "login", 0.0);
        assert_eq!(out[0].entity.file_path(), "b.py");
    }

    #[test]
    fn test_preserves_population() {
        let out = hybrid_rerank(
            vec![candidate("a.py", "x", 0.1), candidate("b.py", "y", 0.2)],
            "query terms",
            DEFAULT_HYBRID_ALPHA,
        );
        assert_eq!(out.len(), 2);
    }
}
