//! Fixed-size record framing for node slots.
//!
//! Every slot is exactly `page_size` bytes and starts with a one-word
//! little-endian marker: EMPTY slots carry no further data, FILLED slots
//! hold the bincode-serialized node followed by zero padding.

use crate::constants::{SLOT_EMPTY, SLOT_FILLED};
use crate::errors::{MTreeError, MTreeResult};
use crate::page::Node;

/// Size of the slot marker in bytes
pub const MARKER_LEN: usize = 4;

/// Fixed per-node encoding overhead: marker, entry count, leaf flag.
pub(crate) const NODE_OVERHEAD: usize = MARKER_LEN + 8 + 1;

/// Encoded size of a leaf entry: variant tag, object id, parent distance.
pub(crate) const LEAF_ENTRY_SIZE: usize = 4 + 8 + 9;

/// Encoded size of a directory entry: variant tag, routing object,
/// parent distance, child page, covering radius.
pub(crate) const DIR_ENTRY_SIZE: usize = 4 + 8 + 9 + 8 + 8;

/// Serializes a node into a full slot of `page_size` bytes.
///
/// A node that does not fit the slot is a configuration error; node
/// capacities must be derived from the page size so this cannot happen
/// in normal operation.
pub fn encode_node(node: &Node, page_size: usize) -> MTreeResult<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(node, bincode::config::legacy())
        .map_err(|e| MTreeError::Serialization(e.to_string()))?;
    if MARKER_LEN + body.len() > page_size {
        return Err(MTreeError::Configuration(format!(
            "record of {} bytes does not fit into a page of {} bytes",
            MARKER_LEN + body.len(),
            page_size
        )));
    }
    let mut buf = Vec::with_capacity(page_size);
    buf.extend_from_slice(&SLOT_FILLED.to_le_bytes());
    buf.extend_from_slice(&body);
    buf.resize(page_size, 0);
    Ok(buf)
}

/// Produces an EMPTY slot of `page_size` bytes.
pub fn empty_slot(page_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; page_size];
    buf[..MARKER_LEN].copy_from_slice(&SLOT_EMPTY.to_le_bytes());
    buf
}

/// Deserializes a slot. EMPTY slots yield `None`.
pub fn decode_node(buf: &[u8]) -> MTreeResult<Option<Node>> {
    if buf.len() < MARKER_LEN {
        return Err(MTreeError::CorruptFormat(format!(
            "slot of {} bytes is shorter than the marker",
            buf.len()
        )));
    }
    let mut marker_bytes = [0u8; MARKER_LEN];
    marker_bytes.copy_from_slice(&buf[..MARKER_LEN]);
    match u32::from_le_bytes(marker_bytes) {
        SLOT_EMPTY => Ok(None),
        SLOT_FILLED => {
            let (node, _) =
                bincode::serde::decode_from_slice(&buf[MARKER_LEN..], bincode::config::legacy())
                    .map_err(|e| MTreeError::Serialization(e.to_string()))?;
            Ok(Some(node))
        }
        other => Err(MTreeError::CorruptFormat(format!(
            "unexpected slot marker {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{DirectoryEntry, Entry, LeafEntry};

    fn sample_leaf() -> Node {
        let mut node = Node::new_leaf();
        node.entries.push(Entry::Leaf(LeafEntry {
            object_id: 42,
            parent_distance: Some(1.5),
        }));
        node.entries.push(Entry::Leaf(LeafEntry {
            object_id: 43,
            parent_distance: None,
        }));
        node
    }

    #[test]
    fn test_round_trip_leaf_node() {
        let node = sample_leaf();
        let buf = encode_node(&node, 256).unwrap();
        assert_eq!(buf.len(), 256);

        let decoded = decode_node(&buf).unwrap().unwrap();
        assert_eq!(decoded.entries, node.entries);
        assert!(decoded.is_leaf);
        // runtime flag is not persisted
        assert!(!decoded.dirty);
    }

    #[test]
    fn test_round_trip_directory_node() {
        let mut node = Node::new_directory();
        node.entries.push(Entry::Directory(DirectoryEntry {
            routing_object: 7,
            parent_distance: Some(2.0),
            child_page: 3,
            covering_radius: 4.5,
        }));
        let buf = encode_node(&node, 256).unwrap();
        let decoded = decode_node(&buf).unwrap().unwrap();
        assert_eq!(decoded.entries, node.entries);
        assert!(!decoded.is_leaf);
    }

    #[test]
    fn test_empty_slot_decodes_to_none() {
        let buf = empty_slot(128);
        assert!(decode_node(&buf).unwrap().is_none());
    }

    #[test]
    fn test_unknown_marker_is_corrupt() {
        let mut buf = empty_slot(128);
        buf[0] = 9;
        assert!(matches!(
            decode_node(&buf),
            Err(MTreeError::CorruptFormat(_))
        ));
    }

    #[test]
    fn test_oversized_record_is_configuration_error() {
        let mut node = Node::new_leaf();
        for id in 0..100 {
            node.entries.push(Entry::Leaf(LeafEntry {
                object_id: id,
                parent_distance: Some(id as f64),
            }));
        }
        assert!(matches!(
            encode_node(&node, 64),
            Err(MTreeError::Configuration(_))
        ));
    }

    #[test]
    fn test_entry_size_constants() {
        let leaf = Entry::Leaf(LeafEntry {
            object_id: 1,
            parent_distance: Some(1.0),
        });
        let encoded = bincode::serde::encode_to_vec(&leaf, bincode::config::legacy()).unwrap();
        assert_eq!(encoded.len(), LEAF_ENTRY_SIZE);

        let dir = Entry::Directory(DirectoryEntry {
            routing_object: 1,
            parent_distance: Some(1.0),
            child_page: 2,
            covering_radius: 3.0,
        });
        let encoded = bincode::serde::encode_to_vec(&dir, bincode::config::legacy()).unwrap();
        assert_eq!(encoded.len(), DIR_ENTRY_SIZE);

        let node = sample_leaf();
        let body = bincode::serde::encode_to_vec(&node, bincode::config::legacy()).unwrap();
        assert!(MARKER_LEN + body.len() <= NODE_OVERHEAD + 2 * LEAF_ENTRY_SIZE);
    }
}
