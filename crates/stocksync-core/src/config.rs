//! Configuration for the sync services.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;
use crate::ports::MAX_BATCH_WRITES;

/// Sync layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Time-to-live for cached reads.
    pub cache_ttl: Duration,

    /// Buffered writes that trigger an automatic commit.
    pub batch_limit: usize,

    /// Page size used when a caller does not pass one.
    pub default_page_size: usize,

    /// Upper bound (inclusive) for "low stock".
    pub low_stock_threshold: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            batch_limit: MAX_BATCH_WRITES,
            default_page_size: 20,
            low_stock_threshold: 10,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Check the values against the store's commit ceiling.
    pub fn validate(&self, max_batch_size: usize) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.batch_limit == 0 || self.batch_limit > max_batch_size {
            problems.push(format!(
                "batch_limit must be between 1 and {max_batch_size}, got {}",
                self.batch_limit
            ));
        }
        if self.default_page_size == 0 {
            problems.push("default_page_size must be greater than zero".to_string());
        }
        if self.cache_ttl.is_zero() {
            problems.push("cache_ttl must be greater than zero".to_string());
        }
        if self.low_stock_threshold < 1 {
            problems.push(format!(
                "low_stock_threshold must be at least 1, got {}",
                self.low_stock_threshold
            ));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_store_limits() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_limit, 500);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.validate(MAX_BATCH_WRITES).is_ok());
    }

    #[test]
    fn batch_limit_above_store_ceiling_is_rejected() {
        let config = SyncConfig::new().with_batch_limit(501);
        let problems = config.validate(MAX_BATCH_WRITES).unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("batch_limit"));
    }

    #[test]
    fn every_problem_is_reported() {
        let config = SyncConfig::new()
            .with_batch_limit(0)
            .with_default_page_size(0)
            .with_cache_ttl(Duration::ZERO)
            .with_low_stock_threshold(0);
        assert_eq!(config.validate(MAX_BATCH_WRITES).unwrap_err().len(), 4);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "batch_limit": 100 }"#).unwrap();
        assert_eq!(config.batch_limit, 100);
        assert_eq!(config.default_page_size, 20);
    }
}
