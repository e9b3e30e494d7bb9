use std::path::{Path, PathBuf};

/// Number of ranges a large file is split into.
pub const CHUNK_COUNT: u64 = 3;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 5_120_000;
pub const DEFAULT_USER_AGENT: &str = concat!("artifetch/", env!("CARGO_PKG_VERSION"));

/// Resolver settings, fixed for the lifetime of a resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    base_url: String,
    working_dir: PathBuf,
    concurrency: usize,
    chunk_threshold: u64,
    user_agent: String,
}

impl ResolverConfig {
    pub fn new(base_url: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            working_dir: working_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Maximum number of artifacts downloaded at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_chunk_threshold(mut self, bytes: u64) -> Self {
        self.chunk_threshold = bytes;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn chunk_threshold(&self) -> u64 {
        self.chunk_threshold
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ResolverConfig::new("http://host/art/", "/work");
        assert_eq!(config.base_url(), "http://host/art");
        assert_eq!(config.concurrency(), DEFAULT_CONCURRENCY);
        assert_eq!(config.chunk_threshold(), 5_120_000);
        assert!(config.user_agent().starts_with("artifetch/"));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let config = ResolverConfig::new("http://h", "/w").with_concurrency(0);
        assert_eq!(config.concurrency(), 1);
    }
}
