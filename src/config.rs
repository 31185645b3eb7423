use std::path::PathBuf;

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Process-wide settings, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: String,
    pub llm_gateway_url: String,
    pub llm_gateway_enabled: bool,
    pub llm_gateway_model: String,
    pub github_hub_url: String,
    pub github_hub_enabled: bool,
    pub github_default_conn: Option<String>,
    pub embedding_dimensions: usize,
    pub embedding_model: String,
    pub reranker_enabled: bool,
    pub reranker_topk: usize,
    pub agentic_max_iters: usize,
    pub cache_ttl_secs: u64,
    pub git_timeout_secs: u64,
    pub enable_git_analysis: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            data_dir: env_string("CODECONTEXT_DATA_DIR", "./data"),
            llm_gateway_url: env_string("LLM_GATEWAY_URL", "http://llm-gateway:3010"),
            llm_gateway_enabled: env_bool("LLM_GATEWAY_ENABLED", false),
            llm_gateway_model: env_string("LLM_GATEWAY_MODEL", "gpt-4o-mini"),
            github_hub_url: env_string("GITHUB_HUB_URL", "http://localhost:3002"),
            github_hub_enabled: env_bool("GITHUB_HUB_ENABLED", false),
            github_default_conn: std::env::var("GITHUB_DEFAULT_CONN").ok(),
            embedding_dimensions: env_parse("EMBEDDING_DIMENSIONS", 384),
            embedding_model: env_string("EMBEDDING_MODEL", "text-embedding-3-small"),
            reranker_enabled: env_bool("RERANKER_ENABLED", true),
            reranker_topk: env_parse("RERANKER_TOPK", 50),
            agentic_max_iters: env_parse("AGENTIC_MAX_ITERS", 2).min(2),
            cache_ttl_secs: env_parse("CACHE_TTL", 3600),
            git_timeout_secs: env_parse("GIT_TIMEOUT_SECS", 120),
            enable_git_analysis: env_bool("ENABLE_GIT_ANALYSIS", true),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn index_meta_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("index_meta")
    }

    pub fn ltr_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("ltr")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_dirs() {
        let settings = Settings::from_env().with_data_dir("/var/ctx");
        assert_eq!(settings.index_meta_dir(), PathBuf::from("/var/ctx/index_meta"));
        assert_eq!(settings.ltr_dir(), PathBuf::from("/var/ctx/ltr"));
    }

    #[test]
    fn test_agentic_iters_capped() {
        let settings = Settings::from_env();
        assert!(settings.agentic_max_iters <= 2);
    }
}
