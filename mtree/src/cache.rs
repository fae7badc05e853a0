//! Write-back LRU page cache over a [`PageStore`].
//!
//! Pages are kept in memory up to `cache_size_bytes / page_size` entries.
//! Writes only mark the cached copy dirty; the disk copy is refreshed
//! when the page is evicted, flushed, or the store closes. All state
//! lives behind a single mutex, and eviction write-back runs inline
//! under that mutex without re-entering the cache.

use std::num::NonZeroUsize;

use log::trace;
use lru::LruCache;
use parking_lot::Mutex;

use crate::errors::{MTreeError, MTreeResult};
use crate::page::{Node, PageHeader, PageId};
use crate::storage::PageStore;

/// Counters describing cache and disk activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
    pub resident_pages: usize,
    pub capacity: usize,
}

struct CacheInner {
    store: PageStore,
    pages: LruCache<PageId, Node>,
    hits: u64,
    misses: u64,
}

/// A page store front-end with LRU caching and write-back semantics.
pub struct CachingPageStore {
    inner: Mutex<CacheInner>,
}

impl CachingPageStore {
    /// Wraps `store` with a cache holding `cache_size_bytes / page_size`
    /// pages. A cache too small for a single page is a configuration
    /// error.
    pub fn new(store: PageStore, cache_size_bytes: usize) -> MTreeResult<Self> {
        let capacity = Self::capacity_for(cache_size_bytes, store.page_size())?;
        Ok(CachingPageStore {
            inner: Mutex::new(CacheInner {
                store,
                pages: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        })
    }

    fn capacity_for(cache_size_bytes: usize, page_size: usize) -> MTreeResult<NonZeroUsize> {
        NonZeroUsize::new(cache_size_bytes / page_size).ok_or_else(|| {
            MTreeError::Configuration(format!(
                "cache of {} bytes cannot hold a single page of {} bytes",
                cache_size_bytes, page_size
            ))
        })
    }

    /// Reads a page, serving it from the cache when resident. A miss
    /// loads the page from disk and caches it. Returns `None` for an
    /// EMPTY slot.
    pub fn read_page(&self, id: PageId) -> MTreeResult<Option<Node>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(node) = inner.pages.get(&id).cloned() {
            inner.hits += 1;
            return Ok(Some(node));
        }
        inner.misses += 1;

        let node = match inner.store.read_page(id)? {
            Some(node) => node,
            None => return Ok(None),
        };
        Self::insert(inner, id, node.clone())?;
        Ok(Some(node))
    }

    /// Stores a page in the cache and marks it dirty. No disk I/O
    /// happens until eviction, flush, or close.
    pub fn write_page(&self, id: PageId, mut node: Node) -> MTreeResult<()> {
        node.dirty = true;
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        Self::insert(inner, id, node)
    }

    /// Removes a page from the cache, discarding any dirty copy, and
    /// deletes its slot in the backing store.
    pub fn delete_page(&self, id: PageId) -> MTreeResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.pages.pop(&id);
        inner.store.delete_page(id)
    }

    pub fn allocate_page(&self) -> PageId {
        self.inner.lock().store.allocate_page()
    }

    pub fn next_page_id(&self) -> PageId {
        self.inner.lock().store.next_page_id()
    }

    /// Resets the allocator cursor; cached pages at or beyond the new
    /// cursor are discarded together with the stale free-list ids.
    pub fn set_next_page_id(&self, next: PageId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let stale: Vec<PageId> = inner
            .pages
            .iter()
            .map(|(id, _)| *id)
            .filter(|&id| id >= next)
            .collect();
        for id in stale {
            inner.pages.pop(&id);
        }
        inner.store.set_next_page_id(next);
    }

    pub fn page_size(&self) -> usize {
        self.inner.lock().store.page_size()
    }

    pub fn header(&self) -> PageHeader {
        self.inner.lock().store.header().clone()
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        CacheStats {
            cache_hits: guard.hits,
            cache_misses: guard.misses,
            disk_reads: guard.store.disk_reads(),
            disk_writes: guard.store.disk_writes(),
            resident_pages: guard.pages.len(),
            capacity: guard.pages.cap().get(),
        }
    }

    /// Resizes the cache. Shrinking evicts the oldest excess pages
    /// immediately, writing dirty ones through.
    pub fn set_cache_size(&self, cache_size_bytes: usize) -> MTreeResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let capacity = Self::capacity_for(cache_size_bytes, inner.store.page_size())?;
        while inner.pages.len() > capacity.get() {
            Self::evict_oldest(inner)?;
        }
        inner.pages.resize(capacity);
        Ok(())
    }

    /// Writes every resident dirty page through to disk, marking it
    /// clean but keeping it resident, then syncs the backing store.
    pub fn flush(&self) -> MTreeResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let dirty: Vec<PageId> = inner
            .pages
            .iter()
            .filter(|(_, node)| node.dirty)
            .map(|(id, _)| *id)
            .collect();
        trace!("flushing {} dirty pages", dirty.len());
        for id in dirty {
            if let Some(node) = inner.pages.peek_mut(&id) {
                inner.store.write_page(id, node)?;
            }
        }
        inner.store.flush()
    }

    /// Drains the cache, writing dirty pages through, and closes the
    /// backing store.
    pub fn close(self) -> MTreeResult<()> {
        let mut inner = self.inner.into_inner();
        while let Some((id, mut node)) = inner.pages.pop_lru() {
            if node.dirty {
                inner.store.write_page(id, &mut node)?;
            }
        }
        inner.store.close()
    }

    /// Inserts a page, evicting the least recently used one first if
    /// the cache is full and the page is not already resident.
    fn insert(inner: &mut CacheInner, id: PageId, node: Node) -> MTreeResult<()> {
        if inner.pages.len() >= inner.pages.cap().get() && !inner.pages.contains(&id) {
            Self::evict_oldest(inner)?;
        }
        inner.pages.push(id, node);
        Ok(())
    }

    fn evict_oldest(inner: &mut CacheInner) -> MTreeResult<()> {
        if let Some((id, mut node)) = inner.pages.pop_lru() {
            if node.dirty {
                trace!("evicting dirty page {}", id);
                inner.store.write_page(id, &mut node)?;
            }
        }
        Ok(())
    }
}
