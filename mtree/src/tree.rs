//! The disk-backed metric tree.
//!
//! Objects are stored by id; all geometry comes from the configured
//! [`DistanceFunction`]. Inserts descend along routing objects, growing
//! covering radii as needed, and resolve overflows bottom-up with the
//! configured split strategy. Queries prune subtrees with the triangle
//! inequality over stored parent distances and covering radii.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

use log::debug;

use crate::cache::{CacheStats, CachingPageStore};
use crate::codec::{DIR_ENTRY_SIZE, LEAF_ENTRY_SIZE, NODE_OVERHEAD};
use crate::config::TreeConfig;
use crate::distance::DistanceFunction;
use crate::errors::{MTreeError, MTreeResult};
use crate::page::{DirectoryEntry, Entry, LeafEntry, Node, ObjectId, PageHeader, PageId};
use crate::split::{DistributionStrategy, SplitStrategy};
use crate::storage::PageStore;

/// The root node always lives in page slot 0; splits move other nodes,
/// never the root page itself.
pub const ROOT_PAGE: PageId = 0;

/// One step of a root-to-node descent: the page, and for non-root
/// steps the index of its routing entry in the parent node.
#[derive(Debug, Clone, Copy)]
struct PathStep {
    page: PageId,
    parent_index: Option<usize>,
}

/// A single query match.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub object_id: ObjectId,
    pub distance: f64,
}

/// A disk-backed M-Tree over an external metric.
pub struct MetricTree<D: DistanceFunction> {
    file: CachingPageStore,
    metric: D,
    splitter: SplitStrategy,
    distribution: DistributionStrategy,
    dir_capacity: usize,
    leaf_capacity: usize,
}

impl<D: DistanceFunction> MetricTree<D> {
    /// Opens or creates a metric tree at `path`.
    ///
    /// On an existing file the page size and node capacities recorded
    /// in its header take precedence over `config`.
    pub fn open(path: impl AsRef<Path>, metric: D, config: TreeConfig) -> MTreeResult<Self> {
        config.validate()?;
        let (dir_capacity, leaf_capacity) = capacities(config.page_size)?;
        let header = PageHeader::new(
            config.page_size as u32,
            dir_capacity as u32,
            leaf_capacity as u32,
        );
        let (store, existed) = PageStore::initialize(path, header)?;
        let (dir_capacity, leaf_capacity) = if existed {
            let header = store.header();
            (header.dir_capacity as usize, header.leaf_capacity as usize)
        } else {
            (dir_capacity, leaf_capacity)
        };
        let file = CachingPageStore::new(store, config.cache_size_bytes)?;

        let tree = MetricTree {
            file,
            metric,
            splitter: config.split.into(),
            distribution: config.distribution,
            dir_capacity,
            leaf_capacity,
        };
        if !existed {
            let root = tree.file.allocate_page();
            debug_assert_eq!(root, ROOT_PAGE);
            tree.file.write_page(ROOT_PAGE, Node::new_leaf())?;
        }
        Ok(tree)
    }

    pub fn metric(&self) -> &D {
        &self.metric
    }

    pub fn dir_capacity(&self) -> usize {
        self.dir_capacity
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.file.stats()
    }

    /// Inserts an object into the tree.
    pub fn insert(&mut self, object: ObjectId) -> MTreeResult<()> {
        debug!("insert object {}", object);
        let mut path = self.find_insertion_path(object)?;
        let leaf_step = path[path.len() - 1];

        let parent_distance = match leaf_step.parent_index {
            Some(index) => {
                let parent = self.read_node(path[path.len() - 2].page)?;
                Some(self.metric.distance(object, parent.entries[index].object_id()))
            }
            None => None,
        };

        let mut leaf = self.read_node(leaf_step.page)?;
        leaf.entries.push(Entry::Leaf(LeafEntry {
            object_id: object,
            parent_distance,
        }));
        leaf.dirty = true;
        self.write_node(leaf_step.page, leaf)?;

        while self.has_overflow(&path)? {
            path = self.split_node(path)?;
        }
        Ok(())
    }

    /// All objects within `radius` of the query object, ascending by
    /// distance.
    pub fn range_query(&self, query: ObjectId, radius: f64) -> MTreeResult<Vec<QueryResult>> {
        let mut result = Vec::new();
        self.range_search(ROOT_PAGE, None, query, radius, &mut result)?;
        result.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(result)
    }

    /// The `k` objects nearest to the query object, ascending by
    /// distance. Requesting zero neighbors is a configuration error.
    pub fn knn_query(&self, query: ObjectId, k: usize) -> MTreeResult<Vec<QueryResult>> {
        if k == 0 {
            return Err(MTreeError::Configuration(
                "at least one neighbor must be requested".to_string(),
            ));
        }
        let mut neighbors = KnnList::new(k);
        let mut queue: BinaryHeap<Reverse<QueueEntry>> = BinaryHeap::new();
        queue.push(Reverse(QueueEntry {
            min_distance: 0.0,
            page: ROOT_PAGE,
            routing: None,
        }));

        while let Some(Reverse(head)) = queue.pop() {
            if head.min_distance > neighbors.kth_distance() {
                break;
            }
            let node = self.read_node(head.page)?;
            let query_to_parent = head.routing.map(|o| self.metric.distance(o, query));

            if node.is_leaf {
                for entry in &node.entries {
                    if let (Some(dq), Some(dp)) = (query_to_parent, entry.parent_distance()) {
                        if (dq - dp).abs() > neighbors.kth_distance() {
                            continue;
                        }
                    }
                    let distance = self.metric.distance(entry.object_id(), query);
                    if distance <= neighbors.kth_distance() {
                        neighbors.add(QueryResult {
                            object_id: entry.object_id(),
                            distance,
                        });
                    }
                }
            } else {
                for entry in &node.entries {
                    let dir = self.as_directory(entry, head.page)?;
                    if let (Some(dq), Some(dp)) = (query_to_parent, dir.parent_distance) {
                        if (dq - dp).abs() > neighbors.kth_distance() + dir.covering_radius {
                            continue;
                        }
                    }
                    let distance = self.metric.distance(dir.routing_object, query);
                    let min_distance = (distance - dir.covering_radius).max(0.0);
                    if min_distance <= neighbors.kth_distance() {
                        queue.push(Reverse(QueueEntry {
                            min_distance,
                            page: dir.child_page,
                            routing: Some(dir.routing_object),
                        }));
                    }
                }
            }
        }
        Ok(neighbors.into_sorted_vec())
    }

    /// Writes all dirty pages through to disk, keeping the cache warm.
    pub fn flush(&self) -> MTreeResult<()> {
        self.file.flush()
    }

    /// Flushes everything and closes the underlying page file.
    pub fn close(self) -> MTreeResult<()> {
        self.file.close()
    }

    fn read_node(&self, page: PageId) -> MTreeResult<Node> {
        match self.file.read_page(page) {
            Ok(Some(node)) => Ok(node),
            Ok(None) => Err(MTreeError::CorruptFormat(format!("page {} is empty", page))
                .in_operation("read node", page)),
            Err(e) => Err(e.in_operation("read node", page)),
        }
    }

    fn write_node(&self, page: PageId, node: Node) -> MTreeResult<()> {
        self.file
            .write_page(page, node)
            .map_err(|e| e.in_operation("write node", page))
    }

    fn as_directory<'a>(
        &self,
        entry: &'a Entry,
        page: PageId,
    ) -> MTreeResult<&'a DirectoryEntry> {
        match entry {
            Entry::Directory(dir) => Ok(dir),
            Entry::Leaf(_) => Err(MTreeError::InvariantViolation(format!(
                "leaf entry in directory node {}",
                page
            ))),
        }
    }

    /// Descends from the root to the leaf that should receive `object`.
    ///
    /// Among children whose covering radius already contains the object
    /// the closest wins; otherwise the child needing the least radius
    /// enlargement wins and its covering radius is grown in place.
    fn find_insertion_path(&self, object: ObjectId) -> MTreeResult<Vec<PathStep>> {
        let mut path = vec![PathStep {
            page: ROOT_PAGE,
            parent_index: None,
        }];
        loop {
            let step = path[path.len() - 1];
            let mut node = self.read_node(step.page)?;
            if node.is_leaf {
                return Ok(path);
            }
            if node.is_empty() {
                return Err(MTreeError::InvariantViolation(format!(
                    "directory node {} has no entries",
                    step.page
                )));
            }

            let mut best_covering: Option<(f64, usize)> = None;
            let mut best_extending: Option<(f64, usize)> = None;
            for (index, entry) in node.entries.iter().enumerate() {
                let dir = self.as_directory(entry, step.page)?;
                let distance = self.metric.distance(object, dir.routing_object);
                let enlargement = distance - dir.covering_radius;
                if enlargement <= 0.0 {
                    if best_covering.map_or(true, |(d, _)| distance < d) {
                        best_covering = Some((distance, index));
                    }
                } else if best_extending.map_or(true, |(e, _)| enlargement < e) {
                    best_extending = Some((enlargement, index));
                }
            }

            let index = match (best_covering, best_extending) {
                (Some((_, index)), _) => index,
                (None, Some((enlargement, index))) => {
                    if let Entry::Directory(dir) = &mut node.entries[index] {
                        dir.covering_radius += enlargement;
                    }
                    node.dirty = true;
                    let child = self.as_directory(&node.entries[index], step.page)?.child_page;
                    self.write_node(step.page, node)?;
                    path.push(PathStep {
                        page: child,
                        parent_index: Some(index),
                    });
                    continue;
                }
                (None, None) => {
                    return Err(MTreeError::InvariantViolation(format!(
                        "no insertion candidate in directory node {}",
                        step.page
                    )))
                }
            };
            let child = self.as_directory(&node.entries[index], step.page)?.child_page;
            path.push(PathStep {
                page: child,
                parent_index: Some(index),
            });
        }
    }

    fn has_overflow(&self, path: &[PathStep]) -> MTreeResult<bool> {
        let step = path[path.len() - 1];
        let node = self.read_node(step.page)?;
        let capacity = if node.is_leaf {
            self.leaf_capacity
        } else {
            self.dir_capacity
        };
        Ok(node.entries.len() >= capacity)
    }

    /// Splits the overflowing node at the end of `path`, returning the
    /// path to its parent so the overflow check can cascade upwards.
    fn split_node(&mut self, mut path: Vec<PathStep>) -> MTreeResult<Vec<PathStep>> {
        let step = path[path.len() - 1];
        let mut node = self.read_node(step.page)?;

        let assignments = self.splitter.split(&node, &self.metric, self.distribution)?;
        debug!(
            "split page {}: promoted ({}, {}), sides {}/{}",
            step.page,
            assignments.first_routing,
            assignments.second_routing,
            assignments.first.len(),
            assignments.second.len()
        );

        let sibling_page = self.file.allocate_page();
        let mut sibling = if node.is_leaf {
            Node::new_leaf()
        } else {
            Node::new_directory()
        };
        node.entries = assignments.first.clone();
        node.dirty = true;
        sibling.entries = assignments.second.clone();
        self.reanchor(&mut node, assignments.first_routing);
        self.reanchor(&mut sibling, assignments.second_routing);

        if step.page == ROOT_PAGE {
            // the root page id never changes: the old root moves to a
            // fresh page and page 0 becomes a directory over both halves
            let moved_page = self.file.allocate_page();
            self.write_node(moved_page, node)?;
            self.write_node(sibling_page, sibling)?;

            let mut root = Node::new_directory();
            root.entries.push(Entry::Directory(DirectoryEntry {
                routing_object: assignments.first_routing,
                parent_distance: None,
                child_page: moved_page,
                covering_radius: assignments.first_radius,
            }));
            root.entries.push(Entry::Directory(DirectoryEntry {
                routing_object: assignments.second_routing,
                parent_distance: None,
                child_page: sibling_page,
                covering_radius: assignments.second_radius,
            }));
            self.write_node(ROOT_PAGE, root)?;
            debug!(
                "new root over pages {} and {}",
                moved_page, sibling_page
            );
            return Ok(vec![PathStep {
                page: ROOT_PAGE,
                parent_index: None,
            }]);
        }

        self.write_node(step.page, node)?;
        self.write_node(sibling_page, sibling)?;

        let parent_step = path[path.len() - 2];
        let mut parent = self.read_node(parent_step.page)?;

        // promoted objects measure their parent distances against the
        // routing object above the parent, absent at the root
        let (first_distance, second_distance) = match parent_step.parent_index {
            Some(grand_index) => {
                let grandparent = self.read_node(path[path.len() - 3].page)?;
                let anchor = grandparent.entries[grand_index].object_id();
                (
                    Some(self.metric.distance(assignments.first_routing, anchor)),
                    Some(self.metric.distance(assignments.second_routing, anchor)),
                )
            }
            None => (None, None),
        };

        let index = step.parent_index.ok_or_else(|| {
            MTreeError::InvariantViolation("non-root node without a parent index".to_string())
        })?;
        match &mut parent.entries[index] {
            Entry::Directory(dir) => {
                dir.routing_object = assignments.first_routing;
                dir.parent_distance = first_distance;
                dir.covering_radius = assignments.first_radius;
            }
            Entry::Leaf(_) => {
                return Err(MTreeError::InvariantViolation(format!(
                    "leaf entry in directory node {}",
                    parent_step.page
                )))
            }
        }
        parent.entries.push(Entry::Directory(DirectoryEntry {
            routing_object: assignments.second_routing,
            parent_distance: second_distance,
            child_page: sibling_page,
            covering_radius: assignments.second_radius,
        }));
        parent.dirty = true;
        self.write_node(parent_step.page, parent)?;

        path.pop();
        Ok(path)
    }

    /// Recomputes every entry's parent distance against the node's new
    /// routing object.
    fn reanchor(&self, node: &mut Node, routing: ObjectId) {
        for entry in &mut node.entries {
            let distance = self.metric.distance(routing, entry.object_id());
            entry.set_parent_distance(Some(distance));
        }
        node.dirty = true;
    }

    fn range_search(
        &self,
        page: PageId,
        routing: Option<ObjectId>,
        query: ObjectId,
        radius: f64,
        result: &mut Vec<QueryResult>,
    ) -> MTreeResult<()> {
        let node = self.read_node(page)?;
        let query_to_parent = routing.map(|o| self.metric.distance(o, query));

        if node.is_leaf {
            for entry in &node.entries {
                // stored parent distance gives a lower bound on the
                // real distance, often saving the metric evaluation
                if let (Some(dq), Some(dp)) = (query_to_parent, entry.parent_distance()) {
                    if (dq - dp).abs() > radius {
                        continue;
                    }
                }
                let distance = self.metric.distance(entry.object_id(), query);
                if distance <= radius {
                    result.push(QueryResult {
                        object_id: entry.object_id(),
                        distance,
                    });
                }
            }
        } else {
            for entry in &node.entries {
                let dir = self.as_directory(entry, page)?;
                if let (Some(dq), Some(dp)) = (query_to_parent, dir.parent_distance) {
                    if (dq - dp).abs() > radius + dir.covering_radius {
                        continue;
                    }
                }
                let distance = self.metric.distance(dir.routing_object, query);
                if distance <= radius + dir.covering_radius {
                    self.range_search(dir.child_page, Some(dir.routing_object), query, radius, result)?;
                }
            }
        }
        Ok(())
    }
}

/// Node capacities for a page size, derived from the fixed encoded
/// entry sizes. Capacities that cannot hold two entries make splitting
/// impossible and are rejected.
fn capacities(page_size: usize) -> MTreeResult<(usize, usize)> {
    let usable = page_size.checked_sub(NODE_OVERHEAD).ok_or_else(|| {
        MTreeError::Configuration(format!("page size {} is too small for a node", page_size))
    })?;
    let dir_capacity = usable / DIR_ENTRY_SIZE;
    let leaf_capacity = usable / LEAF_ENTRY_SIZE;
    if dir_capacity < 2 || leaf_capacity < 2 {
        return Err(MTreeError::Configuration(format!(
            "page size {} holds fewer than two entries per node",
            page_size
        )));
    }
    Ok((dir_capacity, leaf_capacity))
}

/// Best-first queue entry: a page and a lower bound on the distance
/// from the query to anything inside it.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    min_distance: f64,
    page: PageId,
    routing: Option<ObjectId>,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.min_distance == other.min_distance && self.page == other.page
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.min_distance
            .total_cmp(&other.min_distance)
            .then_with(|| self.page.cmp(&other.page))
    }
}

/// Bounded ascending list of the k nearest matches found so far.
struct KnnList {
    k: usize,
    items: Vec<QueryResult>,
}

impl KnnList {
    fn new(k: usize) -> Self {
        KnnList {
            k,
            items: Vec::with_capacity(k + 1),
        }
    }

    /// Distance a candidate must not exceed to enter the list.
    fn kth_distance(&self) -> f64 {
        if self.items.len() < self.k {
            f64::INFINITY
        } else {
            self.items[self.k - 1].distance
        }
    }

    fn add(&mut self, result: QueryResult) {
        let position = self
            .items
            .partition_point(|item| item.distance <= result.distance);
        self.items.insert(position, result);
        self.items.truncate(self.k);
    }

    fn into_sorted_vec(self) -> Vec<QueryResult> {
        self.items
    }
}
