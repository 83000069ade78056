//! # Crawler Configuration Module
//!
//! Configuration for the site crawler: traversal depth, fetch timeout, user
//! agent and how many worklist entries may be fetched at once. It uses a
//! builder pattern for flexible configuration.

use std::time::Duration;

/// Default user agent; some institutional sites refuse non-browser agents
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Deepest level whose links are still followed; the start page is level 0
    pub max_depth: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agent to use for requests
    pub user_agent: String,

    /// Maximum number of redirects followed per request
    pub max_redirects: usize,

    /// Number of worklist entries fetched concurrently
    pub concurrency: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            timeout_secs: 5,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_redirects: 10,
            concurrency: 1,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the maximum depth to crawl
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the per-request timeout in seconds
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    /// Set how many pages are fetched at once (at least one)
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency.max(1);
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_builder_clamps_concurrency() {
        let config = CrawlerConfig::builder()
            .max_depth(2)
            .concurrency(0)
            .user_agent("test-agent")
            .build();

        assert_eq!(config.max_depth, 2);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.user_agent, "test-agent");
    }
}
