/// Heuristic token estimate: roughly four characters per token, never zero
/// for non-empty text. Used wherever the gateway's exact counter is
/// unavailable or too slow to consult per block.
pub fn approx_token_count(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(approx_token_count(""), 0);
    }

    #[test]
    fn test_short_text_is_at_least_one() {
        assert_eq!(approx_token_count("ab"), 1);
    }

    #[test]
    fn test_scales_with_length() {
        assert_eq!(approx_token_count(&"x".repeat(400)), 100);
    }
}
