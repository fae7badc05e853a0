//! Construction-time configuration for a metric tree.

use crate::constants::{DEFAULT_CACHE_PAGES, DEFAULT_PAGE_SIZE};
use crate::errors::{MTreeError, MTreeResult};
use crate::split::{DistributionStrategy, SplitKind};

/// Tree configuration, validated when the tree opens.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Size of one on-disk page slot in bytes
    pub page_size: usize,
    /// Total cache budget in bytes; the page cache holds
    /// `cache_size_bytes / page_size` pages
    pub cache_size_bytes: usize,
    /// Promotion heuristic applied on node overflow
    pub split: SplitKind,
    /// Partition rule applied after promotion
    pub distribution: DistributionStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            page_size: DEFAULT_PAGE_SIZE,
            cache_size_bytes: DEFAULT_PAGE_SIZE * DEFAULT_CACHE_PAGES,
            split: SplitKind::MlbDist,
            distribution: DistributionStrategy::Balanced,
        }
    }
}

impl TreeConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_cache_size(mut self, cache_size_bytes: usize) -> Self {
        self.cache_size_bytes = cache_size_bytes;
        self
    }

    pub fn with_split(mut self, split: SplitKind) -> Self {
        self.split = split;
        self
    }

    pub fn with_distribution(mut self, distribution: DistributionStrategy) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn validate(&self) -> MTreeResult<()> {
        if self.page_size == 0 {
            return Err(MTreeError::Configuration(
                "page size must be non-zero".to_string(),
            ));
        }
        if self.cache_size_bytes < self.page_size {
            return Err(MTreeError::Configuration(format!(
                "cache of {} bytes cannot hold a single page of {} bytes",
                self.cache_size_bytes, self.page_size
            )));
        }
        Ok(())
    }
}
