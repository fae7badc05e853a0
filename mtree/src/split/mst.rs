//! Slim-tree minimum-spanning-tree split.
//!
//! Builds a Prim MST over the full distance matrix, removes one long
//! edge to obtain two connected components, and promotes as each side's
//! routing object the member minimizing that side's covering radius.
//! The partitioning is the component structure itself; the configured
//! distribution strategy is not consulted.

use crate::distance::{DistanceFunction, DistanceMatrix};
use crate::page::Node;

use super::{object_ids, Assignments};

#[derive(Debug, Clone, Copy)]
struct MstEdge {
    a: usize,
    b: usize,
    len: f64,
}

pub(super) fn split<D: DistanceFunction>(node: &Node, metric: &D) -> Assignments {
    let ids = object_ids(node);
    let matrix = DistanceMatrix::from_objects(&ids, metric);
    let n = matrix.len();

    let edges = minimum_spanning_tree(&matrix);

    // cut candidates are the edges longer than the median edge length,
    // tried longest first
    let mut lengths: Vec<f64> = edges.iter().map(|edge| edge.len).collect();
    lengths.sort_by(f64::total_cmp);
    let threshold = lengths[lengths.len() / 2];

    let mut candidates: Vec<usize> = (0..edges.len())
        .filter(|&k| edges[k].len > threshold)
        .collect();
    candidates.sort_by(|&a, &b| edges[b].len.total_cmp(&edges[a].len));
    if candidates.is_empty() {
        // every edge is at the threshold, cut the first longest one
        let mut longest = 0;
        for k in 1..edges.len() {
            if edges[k].len > edges[longest].len {
                longest = k;
            }
        }
        candidates.push(longest);
    }

    // keep the cut maximizing the smaller component; on ties the longer
    // omitted edge, tried earlier, stays
    let mut best_cut = candidates[0];
    let mut best_smaller = smaller_component(n, &edges, candidates[0]);
    for &k in &candidates[1..] {
        let smaller = smaller_component(n, &edges, k);
        if smaller > best_smaller {
            best_smaller = smaller;
            best_cut = k;
        }
    }

    // membership of the component containing entry 0
    let mut components = UnionFind::new(n);
    for (k, edge) in edges.iter().enumerate() {
        if k != best_cut {
            components.union(edge.a, edge.b);
        }
    }
    let first_root = components.find(0);
    let mut first_members = Vec::new();
    let mut second_members = Vec::new();
    for v in 0..n {
        if components.find(v) == first_root {
            first_members.push(v);
        } else {
            second_members.push(v);
        }
    }

    let (first_pivot, first_radius) = representative(node, &matrix, &first_members);
    let (second_pivot, second_radius) = representative(node, &matrix, &second_members);

    Assignments {
        first_routing: node.entries[first_pivot].object_id(),
        second_routing: node.entries[second_pivot].object_id(),
        first: first_members
            .iter()
            .map(|&v| node.entries[v].clone())
            .collect(),
        second: second_members
            .iter()
            .map(|&v| node.entries[v].clone())
            .collect(),
        first_radius,
        second_radius,
    }
}

/// Prim's algorithm over the dense matrix, O(n^2). Scans pick the
/// first-found minimum so equal distances resolve deterministically.
fn minimum_spanning_tree(matrix: &DistanceMatrix) -> Vec<MstEdge> {
    let n = matrix.len();
    let mut in_tree = vec![false; n];
    in_tree[0] = true;
    let mut best_len = vec![f64::INFINITY; n];
    let mut best_from = vec![0usize; n];
    for v in 1..n {
        best_len[v] = matrix.get(0, v);
    }

    let mut edges = Vec::with_capacity(n - 1);
    for _ in 1..n {
        let mut next = usize::MAX;
        for v in 0..n {
            if !in_tree[v] && (next == usize::MAX || best_len[v] < best_len[next]) {
                next = v;
            }
        }
        in_tree[next] = true;
        edges.push(MstEdge {
            a: best_from[next],
            b: next,
            len: best_len[next],
        });
        for v in 0..n {
            if !in_tree[v] && matrix.get(next, v) < best_len[v] {
                best_len[v] = matrix.get(next, v);
                best_from[v] = next;
            }
        }
    }
    edges
}

/// Size of the smaller component after removing the edge at `cut`.
fn smaller_component(n: usize, edges: &[MstEdge], cut: usize) -> usize {
    let mut components = UnionFind::new(n);
    for (k, edge) in edges.iter().enumerate() {
        if k != cut {
            components.union(edge.a, edge.b);
        }
    }
    let root = components.find(edges[cut].a);
    let size = (0..n).filter(|&v| components.find(v) == root).count();
    size.min(n - size)
}

/// The member of `members` whose covering radius over the whole
/// partition is minimal, first found on ties.
fn representative(
    node: &Node,
    matrix: &DistanceMatrix,
    members: &[usize],
) -> (usize, f64) {
    let mut best = members[0];
    let mut best_radius = partition_radius(node, matrix, members, members[0]);
    for &candidate in &members[1..] {
        let radius = partition_radius(node, matrix, members, candidate);
        if radius < best_radius {
            best = candidate;
            best_radius = radius;
        }
    }
    (best, best_radius)
}

fn partition_radius(node: &Node, matrix: &DistanceMatrix, members: &[usize], pivot: usize) -> f64 {
    members
        .iter()
        .map(|&v| node.entries[v].radius_contribution(matrix.get(pivot, v)))
        .fold(0.0, f64::max)
}

/// Flat-array union-find with iterative path compression.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_a] = root_b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_complete, cluster_metric, leaf_node, line_metric};
    use super::super::{DistributionStrategy, SplitKind, SplitStrategy};
    use crate::distance::{DistanceFunction, TableMetric};
    use crate::page::ObjectId;

    #[test]
    fn test_cuts_between_the_clusters() {
        let ids = [1u64, 2, 3, 4];
        let node = leaf_node(&ids);
        let metric = cluster_metric();
        let mut strategy: SplitStrategy = SplitKind::Mst.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();

        let mut first: Vec<ObjectId> = assignments.first.iter().map(|e| e.object_id()).collect();
        let mut second: Vec<ObjectId> = assignments.second.iter().map(|e| e.object_id()).collect();
        first.sort_unstable();
        second.sort_unstable();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3, 4]);
        assert_eq!(assignments.first_radius, 1.0);
        assert_eq!(assignments.second_radius, 1.0);
        assert_complete(&assignments, &ids);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let ids: Vec<ObjectId> = (0..8).collect();
        let node = leaf_node(&ids);
        let metric = line_metric(8);
        let mut strategy: SplitStrategy = SplitKind::Mst.into();
        let a = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        let b = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        assert_eq!(a.first_routing, b.first_routing);
        assert_eq!(a.second_routing, b.second_routing);
        assert_eq!(a.first, b.first);
        assert_eq!(a.second, b.second);
    }

    #[test]
    fn test_prefers_balanced_components() {
        // three points bunched at 0, one at 10, two at 20: the longest
        // cut (10..20) leaves a 2/4 division, the 0..10 cut leaves 3/3
        let mut metric = TableMetric::new();
        let positions: [f64; 6] = [0.0, 0.1, 0.2, 10.0, 20.0, 20.1];
        for i in 0..6u64 {
            for j in (i + 1)..6 {
                metric.set(i, j, (positions[i as usize] - positions[j as usize]).abs());
            }
        }
        let ids: Vec<ObjectId> = (0..6).collect();
        let node = leaf_node(&ids);
        let mut strategy: SplitStrategy = SplitKind::Mst.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        assert_eq!(assignments.first.len(), 3);
        assert_eq!(assignments.second.len(), 3);
        assert_complete(&assignments, &ids);
    }

    #[test]
    fn test_representative_covers_its_partition() {
        let ids: Vec<ObjectId> = (0..5).collect();
        let node = leaf_node(&ids);
        let metric = line_metric(5);
        let mut strategy: SplitStrategy = SplitKind::Mst.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        assert_complete(&assignments, &ids);
        for entry in &assignments.first {
            let d = metric.distance(assignments.first_routing, entry.object_id());
            assert!(d <= assignments.first_radius);
        }
        for entry in &assignments.second {
            let d = metric.distance(assignments.second_routing, entry.object_id());
            assert!(d <= assignments.second_radius);
        }
    }
}
