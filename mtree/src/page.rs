//! On-disk node and header types for the metric index.

use serde::{Deserialize, Serialize};

use crate::constants::{MAGIC, VERSION};
use crate::errors::{MTreeError, MTreeResult};

/// Page ID - unique identifier for a node slot in the page file
pub type PageId = u64;

/// Identifier of an indexed object, resolved through the configured metric
pub type ObjectId = u64;

/// An entry in a leaf node: one indexed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub object_id: ObjectId,
    /// Distance to the parent routing object; `None` in the root node
    pub parent_distance: Option<f64>,
}

/// An entry in a directory node: a routing object over one child page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub routing_object: ObjectId,
    /// Distance to the parent routing object; `None` in the root node
    pub parent_distance: Option<f64>,
    pub child_page: PageId,
    /// Upper bound on the distance from the routing object to any object
    /// in the subtree below `child_page`
    pub covering_radius: f64,
}

/// A node entry, either an indexed object or a routing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    Leaf(LeafEntry),
    Directory(DirectoryEntry),
}

impl Entry {
    /// The indexed object or routing object of this entry.
    pub fn object_id(&self) -> ObjectId {
        match self {
            Entry::Leaf(entry) => entry.object_id,
            Entry::Directory(entry) => entry.routing_object,
        }
    }

    pub fn parent_distance(&self) -> Option<f64> {
        match self {
            Entry::Leaf(entry) => entry.parent_distance,
            Entry::Directory(entry) => entry.parent_distance,
        }
    }

    pub fn set_parent_distance(&mut self, distance: Option<f64>) {
        match self {
            Entry::Leaf(entry) => entry.parent_distance = distance,
            Entry::Directory(entry) => entry.parent_distance = distance,
        }
    }

    /// Covering-radius contribution of this entry when it sits at
    /// `distance` from a routing object. Leaf entries are points;
    /// directory entries extend by their own covering radius.
    pub fn radius_contribution(&self, distance: f64) -> f64 {
        match self {
            Entry::Leaf(_) => distance,
            Entry::Directory(entry) => distance + entry.covering_radius,
        }
    }
}

/// A metric-tree node, stored in one page slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub entries: Vec<Entry>,
    pub is_leaf: bool,
    /// Modification flag; dirty nodes are written back on eviction.
    /// Not persisted, nodes read from disk start out clean.
    #[serde(skip)]
    pub dirty: bool,
}

impl Node {
    pub fn new_leaf() -> Self {
        Node {
            entries: Vec::new(),
            is_leaf: true,
            dirty: true,
        }
    }

    pub fn new_directory() -> Self {
        Node {
            entries: Vec::new(),
            is_leaf: false,
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File header, stored in the reserved page block before slot 0.
///
/// Written when the file is created; the allocator cursor and free-list
/// length are rewritten on close so a reopened store resumes where the
/// previous one stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    /// Number of pages reserved for this header before slot 0
    pub reserved_pages: u32,
    pub dir_capacity: u32,
    pub leaf_capacity: u32,
    pub dir_minimum: u32,
    pub leaf_minimum: u32,
    /// Page id allocator cursor, the next id to be issued
    pub next_page_id: PageId,
    /// Number of freed page ids in the trailing free-page-id list
    pub free_list_len: u64,
}

impl PageHeader {
    /// Encoded size under the legacy bincode configuration.
    pub(crate) const ENCODED_LEN: usize = 48;

    pub fn new(page_size: u32, dir_capacity: u32, leaf_capacity: u32) -> Self {
        PageHeader {
            magic: MAGIC,
            version: VERSION,
            page_size,
            reserved_pages: 1,
            dir_capacity,
            leaf_capacity,
            dir_minimum: minimum_for(dir_capacity),
            leaf_minimum: minimum_for(leaf_capacity),
            next_page_id: 0,
            free_list_len: 0,
        }
    }

    /// Validates magic number and version of a header read from disk.
    pub fn validate(&self) -> MTreeResult<()> {
        if self.magic != MAGIC {
            return Err(MTreeError::CorruptFormat(format!(
                "invalid magic number: expected {:#010x}, found {:#010x}",
                MAGIC, self.magic
            )));
        }
        if self.version != VERSION {
            return Err(MTreeError::CorruptFormat(format!(
                "unsupported file version: expected {}, found {}",
                VERSION, self.version
            )));
        }
        if self.page_size == 0 || self.reserved_pages == 0 {
            return Err(MTreeError::CorruptFormat(
                "header has zero page size or reserved pages".to_string(),
            ));
        }
        Ok(())
    }
}

/// Minimum fill of a node after a split, 40% of capacity as in the
/// original M-tree formulation.
fn minimum_for(capacity: u32) -> u32 {
    ((capacity.saturating_sub(1)) * 2 / 5).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_validate() {
        let header = PageHeader::new(4096, 100, 150);
        assert!(header.validate().is_ok());

        let mut bad = header.clone();
        bad.magic = 0xDEADBEEF;
        assert!(matches!(
            bad.validate(),
            Err(MTreeError::CorruptFormat(_))
        ));

        let mut bad = header;
        bad.version = 99;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_header_encoded_len() {
        let header = PageHeader::new(4096, 100, 150);
        let encoded = bincode::serde::encode_to_vec(&header, bincode::config::legacy()).unwrap();
        assert_eq!(encoded.len(), PageHeader::ENCODED_LEN);
    }

    #[test]
    fn test_entry_radius_contribution() {
        let leaf = Entry::Leaf(LeafEntry {
            object_id: 1,
            parent_distance: None,
        });
        assert_eq!(leaf.radius_contribution(3.0), 3.0);

        let dir = Entry::Directory(DirectoryEntry {
            routing_object: 2,
            parent_distance: Some(1.0),
            child_page: 5,
            covering_radius: 2.5,
        });
        assert_eq!(dir.radius_contribution(3.0), 5.5);
    }

    #[test]
    fn test_new_nodes_start_dirty() {
        assert!(Node::new_leaf().dirty);
        assert!(Node::new_directory().dirty);
        assert!(Node::new_leaf().is_leaf);
        assert!(!Node::new_directory().is_leaf);
    }
}
