use sha1::{Digest, Sha1};

/// Semantic signature of a named code body: SHA-1 over
/// `name + '|' + whitespace-stripped code`. Whitespace-only edits and moves
/// across files collapse to the same signature.
pub fn compute_signature(code: &str, name: Option<&str>) -> String {
    let stripped: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    let mut hasher = Sha1::new();
    if let Some(name) = name {
        hasher.update(name.as_bytes());
        hasher.update(b"|");
    }
    hasher.update(stripped.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_under_whitespace_changes() {
        let a = compute_signature("def login(user, pw):\n    return check(user, pw)", Some("login"));
        let b = compute_signature("def login(user,pw):  return check(user,pw)", Some("login"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_name_participates() {
        let a = compute_signature("return 1", Some("f"));
        let b = compute_signature("return 1", Some("g"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_body_participates() {
        let a = compute_signature("return 1", Some("f"));
        let b = compute_signature("return 2", Some("f"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_shape() {
        let sig = compute_signature("x", None);
        assert_eq!(sig.len(), 40);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
