//! Constants for the disk-based M-Tree implementation.

/// Default page size in bytes (16KB)
pub const DEFAULT_PAGE_SIZE: usize = 16384;

/// Default cache size in number of pages (16MB with 16KB pages)
pub const DEFAULT_CACHE_PAGES: usize = 1024;

/// Magic number for file format identification ("MTRI")
pub const MAGIC: u32 = 0x4D545249;

/// File format version
pub const VERSION: u32 = 1;

/// Slot marker for an empty (freed or never written) record
pub const SLOT_EMPTY: u32 = 0;

/// Slot marker for a record holding a serialized node
pub const SLOT_FILLED: u32 = 1;
