//! # mtree - Disk-Backed Metric Indexing
//!
//! This crate provides a disk-based M-Tree, a paged index for searching
//! by similarity under an arbitrary metric. Objects are referenced by
//! id; all distances come from a user-supplied [`DistanceFunction`].
//!
//! ## Features
//!
//! - **Disk-Based Storage**: Fixed-size page slots, loaded on demand
//! - **LRU Cache**: Frequently accessed pages kept in memory with
//!   write-back on eviction
//! - **Persistent**: Data survives process restarts, including the
//!   free-page list
//! - **Pluggable Splits**: Six promotion heuristics (random, farthest
//!   points, minimal radii, parent-distance bounds, spanning tree) and
//!   two distribution rules
//! - **Metric Search**: Range and k-nearest-neighbor queries with
//!   triangle-inequality pruning
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mtree::{EuclideanMetric, MetricTree, TreeConfig};
//! use tempfile::NamedTempFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut metric = EuclideanMetric::new();
//! metric.register(1, vec![0.0, 0.0]);
//! metric.register(2, vec![3.0, 4.0]);
//! metric.register(3, vec![1.0, 1.0]);
//!
//! let file = NamedTempFile::new()?;
//! let mut tree = MetricTree::open(file.path(), metric, TreeConfig::default())?;
//! for id in [1, 2, 3] {
//!     tree.insert(id)?;
//! }
//!
//! // everything within distance 2 of object 1
//! let near = tree.range_query(1, 2.0)?;
//! // the two objects nearest to object 3
//! let nearest = tree.knn_query(3, 2)?;
//! tree.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod constants;
pub mod distance;
pub mod errors;
pub mod page;
pub mod split;
pub mod storage;
pub mod tree;

// Re-export storage types
pub use cache::{CacheStats, CachingPageStore};
pub use page::{DirectoryEntry, Entry, LeafEntry, Node, ObjectId, PageHeader, PageId};
pub use storage::PageStore;

// Re-export metric types
pub use distance::{DistanceFunction, DistanceMatrix, EuclideanMetric, TableMetric};

// Re-export split types
pub use split::{Assignments, DistributionStrategy, SplitKind, SplitStrategy};

// Re-export tree types
pub use config::TreeConfig;
pub use errors::{MTreeError, MTreeResult};
pub use tree::{MetricTree, QueryResult, ROOT_PAGE};
