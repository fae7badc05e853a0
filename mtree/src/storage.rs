//! Disk storage layer: a fixed-record-size page file.
//!
//! The file starts with a reserved header block, followed by fixed-size
//! node slots. Every read or write of a slot is one seek plus one
//! transfer of exactly `page_size` bytes. Freed page ids are kept in a
//! LIFO free list, persisted after the last slot when the store closes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::codec;
use crate::errors::{MTreeError, MTreeResult};
use crate::page::{Node, PageHeader, PageId};

/// A page file holding serialized metric-tree nodes.
pub struct PageStore {
    file: File,
    path: PathBuf,
    header: PageHeader,
    next_page_id: PageId,
    /// Freed page ids, reused LIFO before new ids are issued
    empty_pages: Vec<PageId>,
    disk_reads: u64,
    disk_writes: u64,
}

impl PageStore {
    /// Opens the page file at `path`, creating it if necessary.
    ///
    /// On a fresh file the given header is written and `existed` is
    /// false. On an existing file the header and the trailing
    /// free-page-id list are read back, the given header is discarded,
    /// and `existed` is true.
    pub fn initialize(path: impl AsRef<Path>, header: PageHeader) -> MTreeResult<(Self, bool)> {
        let path = path.as_ref();
        header.validate()?;
        if (header.page_size as usize) * (header.reserved_pages as usize)
            < PageHeader::ENCODED_LEN
        {
            return Err(MTreeError::Configuration(format!(
                "page size {} is too small to hold the file header",
                header.page_size
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut store = PageStore {
            file,
            path: path.to_path_buf(),
            header,
            next_page_id: 0,
            empty_pages: Vec::new(),
            disk_reads: 0,
            disk_writes: 0,
        };

        if file_len == 0 {
            store.write_header()?;
            debug!("created page store at {:?}", store.path);
            Ok((store, false))
        } else {
            store.read_header()?;
            store.next_page_id = store.header.next_page_id;
            store.read_free_list()?;
            debug!(
                "opened page store at {:?}, next page id {}, {} free pages",
                store.path,
                store.next_page_id,
                store.empty_pages.len()
            );
            Ok((store, true))
        }
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn page_size(&self) -> usize {
        self.header.page_size as usize
    }

    /// Byte offset of the slot for `id`, past the reserved header block.
    fn offset(&self, id: PageId) -> u64 {
        (self.header.reserved_pages as u64 + id) * self.header.page_size as u64
    }

    /// Reads the slot for `id`. An EMPTY slot yields `None`.
    pub fn read_page(&mut self, id: PageId) -> MTreeResult<Option<Node>> {
        let offset = self.offset(id);
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.page_size()];
        self.file.read_exact(&mut buf)?;
        self.disk_reads += 1;
        codec::decode_node(&buf)
    }

    /// Writes `node` into the slot for `id` and clears its dirty flag.
    /// Clean nodes are not rewritten.
    pub fn write_page(&mut self, id: PageId, node: &mut Node) -> MTreeResult<()> {
        if !node.dirty {
            return Ok(());
        }
        let buf = codec::encode_node(node, self.page_size())?;
        let offset = self.offset(id);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf)?;
        self.disk_writes += 1;
        node.dirty = false;
        Ok(())
    }

    /// Marks the slot for `id` EMPTY and queues the id for reuse.
    pub fn delete_page(&mut self, id: PageId) -> MTreeResult<()> {
        let buf = codec::empty_slot(self.page_size());
        let offset = self.offset(id);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf)?;
        self.disk_writes += 1;
        self.empty_pages.push(id);
        Ok(())
    }

    /// Issues a page id, reusing the most recently freed id first.
    pub fn allocate_page(&mut self) -> PageId {
        if let Some(id) = self.empty_pages.pop() {
            id
        } else {
            let id = self.next_page_id;
            self.next_page_id += 1;
            id
        }
    }

    /// The next id the sequential allocator would issue.
    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    /// Resets the allocator cursor. Freed ids at or beyond the new
    /// cursor are no longer valid and are dropped from the free list.
    pub fn set_next_page_id(&mut self, next: PageId) {
        self.next_page_id = next;
        self.empty_pages.retain(|&id| id < next);
    }

    pub fn disk_reads(&self) -> u64 {
        self.disk_reads
    }

    pub fn disk_writes(&self) -> u64 {
        self.disk_writes
    }

    /// Rewrites the header with the current allocator state and syncs
    /// file contents to disk.
    pub fn flush(&mut self) -> MTreeResult<()> {
        self.header.next_page_id = self.next_page_id;
        self.header.free_list_len = self.empty_pages.len() as u64;
        self.write_header()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Persists the free-page-id list and the final header, then syncs
    /// and releases the file handle.
    pub fn close(mut self) -> MTreeResult<()> {
        self.header.next_page_id = self.next_page_id;
        self.header.free_list_len = self.empty_pages.len() as u64;
        self.write_free_list()?;
        self.write_header()?;
        self.file.sync_all()?;
        debug!("closed page store at {:?}", self.path);
        Ok(())
    }

    fn write_header(&mut self) -> MTreeResult<()> {
        let buf = bincode::serde::encode_to_vec(&self.header, bincode::config::legacy())
            .map_err(|e| MTreeError::Serialization(e.to_string()))?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    fn read_header(&mut self) -> MTreeResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; PageHeader::ENCODED_LEN];
        self.file.read_exact(&mut buf)?;
        let (header, _): (PageHeader, usize) =
            bincode::serde::decode_from_slice(&buf, bincode::config::legacy())
                .map_err(|e| MTreeError::Serialization(e.to_string()))?;
        header.validate()?;
        self.header = header;
        Ok(())
    }

    /// The free list sits directly after the last issued slot.
    fn free_list_offset(&self) -> u64 {
        self.offset(self.next_page_id)
    }

    fn write_free_list(&mut self) -> MTreeResult<()> {
        let buf = bincode::serde::encode_to_vec(&self.empty_pages, bincode::config::legacy())
            .map_err(|e| MTreeError::Serialization(e.to_string()))?;
        let offset = self.free_list_offset();
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    fn read_free_list(&mut self) -> MTreeResult<()> {
        let count = self.header.free_list_len as usize;
        if count == 0 {
            return Ok(());
        }
        // length prefix plus one u64 per id under the legacy config
        let mut buf = vec![0u8; 8 + 8 * count];
        let offset = self.free_list_offset();
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        let (empty_pages, _): (Vec<PageId>, usize) =
            bincode::serde::decode_from_slice(&buf, bincode::config::legacy())
                .map_err(|e| MTreeError::Serialization(e.to_string()))?;
        if empty_pages.len() != count {
            return Err(MTreeError::CorruptFormat(format!(
                "free list holds {} ids, header says {}",
                empty_pages.len(),
                count
            )));
        }
        self.empty_pages = empty_pages;
        Ok(())
    }
}
