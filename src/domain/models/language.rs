use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Java,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "py" => Language::Python,
            "js" | "jsx" | "ts" | "tsx" => Language::JavaScript,
            "java" => Language::Java,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "python" => Language::Python,
            "javascript" | "typescript" => Language::JavaScript,
            "java" => Language::Java,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::JavaScript => &["js", "jsx", "ts", "tsx"],
            Language::Java => &["java"],
            Language::Unknown => &[],
        }
    }

    pub fn all_supported() -> Vec<Language> {
        vec![Language::Python, Language::JavaScript, Language::Java]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("jsx"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::JavaScript);
        assert_eq!(Language::from_extension("tsx"), Language::JavaScript);
        assert_eq!(Language::from_extension("java"), Language::Java);
        assert_eq!(Language::from_extension("rb"), Language::Unknown);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(
            Language::from_path(Path::new("pkg/auth/login.py")),
            Language::Python
        );
        assert_eq!(
            Language::from_path(Path::new("web/App.tsx")),
            Language::JavaScript
        );
        assert_eq!(Language::from_path(Path::new("README")), Language::Unknown);
    }

    #[test]
    fn test_typescript_keeps_javascript_tag() {
        assert_eq!(Language::from_extension("ts").as_str(), "javascript");
        assert_eq!(Language::parse("typescript"), Language::JavaScript);
    }

    #[test]
    fn test_all_supported_excludes_unknown() {
        let supported = Language::all_supported();
        assert!(supported.contains(&Language::Python));
        assert!(!supported.contains(&Language::Unknown));
    }
}
