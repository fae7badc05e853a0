//! Node split strategies for overflowing metric-tree nodes.
//!
//! A split promotes two routing objects out of an overflowing node and
//! partitions its entries between them. All strategies here only decide
//! the promotion; except for the MST split they hand the partitioning
//! to the configured [`DistributionStrategy`].

mod distribution;
mod farthest;
mod mlb_dist;
mod mrad;
mod mst;
mod random;

pub use distribution::DistributionStrategy;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::distance::DistanceFunction;
use crate::errors::{MTreeError, MTreeResult};
use crate::page::{Entry, Node, ObjectId};

/// Result of partitioning an overflowing node into two sides.
///
/// The routing objects' own entries are members of their respective
/// sides; each covering radius bounds the distance from the routing
/// object to anything below its side.
#[derive(Debug, Clone)]
pub struct Assignments {
    pub first_routing: ObjectId,
    pub second_routing: ObjectId,
    pub first: Vec<Entry>,
    pub second: Vec<Entry>,
    pub first_radius: f64,
    pub second_radius: f64,
}

impl Assignments {
    fn validate(self, original: usize) -> MTreeResult<Self> {
        if self.first.is_empty() || self.second.is_empty() {
            return Err(MTreeError::InvariantViolation(
                "split produced an empty partition".to_string(),
            ));
        }
        if self.first.len() + self.second.len() != original {
            return Err(MTreeError::InvariantViolation(format!(
                "split assigned {} of {} entries",
                self.first.len() + self.second.len(),
                original
            )));
        }
        Ok(self)
    }
}

/// Which promotion heuristic runs on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// Two distinct pivots from a seeded RNG
    Random { seed: u64 },
    /// The globally farthest pair
    FarthestPoints,
    /// Minimum sum of covering radii over all pivot pairs
    MRad,
    /// Minimum maximum covering radius over all pivot pairs
    MMRad,
    /// Minimum and maximum parent distance as pivots
    MlbDist,
    /// Slim-tree minimum-spanning-tree split
    Mst,
}

/// A configured splitter. Random carries its RNG so repeated splits
/// under one seed stay reproducible.
#[derive(Debug)]
pub enum SplitStrategy {
    Random(StdRng),
    FarthestPoints,
    MRad,
    MMRad,
    MlbDist,
    Mst,
}

impl From<SplitKind> for SplitStrategy {
    fn from(kind: SplitKind) -> Self {
        match kind {
            SplitKind::Random { seed } => SplitStrategy::Random(StdRng::seed_from_u64(seed)),
            SplitKind::FarthestPoints => SplitStrategy::FarthestPoints,
            SplitKind::MRad => SplitStrategy::MRad,
            SplitKind::MMRad => SplitStrategy::MMRad,
            SplitKind::MlbDist => SplitStrategy::MlbDist,
            SplitKind::Mst => SplitStrategy::Mst,
        }
    }
}

impl SplitStrategy {
    /// Partitions the entries of an overflowing node into two sides
    /// with promoted routing objects and covering radii.
    ///
    /// A node with fewer than two entries cannot be split; a node with
    /// exactly two is split trivially, one entry per side, regardless
    /// of strategy.
    pub fn split<D: DistanceFunction>(
        &mut self,
        node: &Node,
        metric: &D,
        distribution: DistributionStrategy,
    ) -> MTreeResult<Assignments> {
        let n = node.entries.len();
        if n < 2 {
            return Err(MTreeError::InvariantViolation(format!(
                "cannot split a node with {} entries",
                n
            )));
        }
        if n == 2 {
            return trivial_split(node).validate(n);
        }
        let assignments = match self {
            SplitStrategy::Random(rng) => random::split(node, metric, distribution, rng),
            SplitStrategy::FarthestPoints => farthest::split(node, metric, distribution),
            SplitStrategy::MRad => mrad::split(node, metric, distribution, mrad::Cost::Sum),
            SplitStrategy::MMRad => mrad::split(node, metric, distribution, mrad::Cost::Max),
            SplitStrategy::MlbDist => mlb_dist::split(node, metric, distribution),
            SplitStrategy::Mst => mst::split(node, metric),
        };
        assignments.validate(n)
    }
}

fn trivial_split(node: &Node) -> Assignments {
    let first = node.entries[0].clone();
    let second = node.entries[1].clone();
    Assignments {
        first_routing: first.object_id(),
        second_routing: second.object_id(),
        first_radius: first.radius_contribution(0.0),
        second_radius: second.radius_contribution(0.0),
        first: vec![first],
        second: vec![second],
    }
}

/// Object ids of a node's entries, in entry order.
pub(crate) fn object_ids(node: &Node) -> Vec<ObjectId> {
    node.entries.iter().map(|entry| entry.object_id()).collect()
}

/// Distances from the entry at `pivot` to every entry, in entry order.
pub(crate) fn distance_row<D: DistanceFunction>(
    ids: &[ObjectId],
    metric: &D,
    pivot: usize,
) -> Vec<f64> {
    ids.iter()
        .enumerate()
        .map(|(k, &id)| {
            if k == pivot {
                0.0
            } else {
                metric.distance(ids[pivot], id)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{EuclideanMetric, TableMetric};
    use crate::page::LeafEntry;

    pub(super) fn leaf_node(ids: &[ObjectId]) -> Node {
        let mut node = Node::new_leaf();
        for &id in ids {
            node.entries.push(Entry::Leaf(LeafEntry {
                object_id: id,
                parent_distance: None,
            }));
        }
        node
    }

    pub(super) fn leaf_node_with_parents(entries: &[(ObjectId, f64)]) -> Node {
        let mut node = Node::new_leaf();
        for &(id, parent_distance) in entries {
            node.entries.push(Entry::Leaf(LeafEntry {
                object_id: id,
                parent_distance: Some(parent_distance),
            }));
        }
        node
    }

    pub(super) fn line_metric(n: u64) -> EuclideanMetric {
        let mut metric = EuclideanMetric::new();
        for id in 0..n {
            metric.register(id, vec![id as f64]);
        }
        metric
    }

    /// Two tight clusters {1, 2} and {3, 4} far apart. Object ids map
    /// to A=1, B=2, C=3, D=4.
    pub(super) fn cluster_metric() -> TableMetric {
        let mut metric = TableMetric::new();
        metric.set(1, 2, 1.0);
        metric.set(3, 4, 1.0);
        metric.set(1, 3, 10.0);
        metric.set(1, 4, 9.0);
        metric.set(2, 3, 9.0);
        metric.set(2, 4, 10.0);
        metric
    }

    pub(super) fn assert_complete(assignments: &Assignments, ids: &[ObjectId]) {
        assert!(!assignments.first.is_empty());
        assert!(!assignments.second.is_empty());
        let mut seen: Vec<ObjectId> = assignments
            .first
            .iter()
            .chain(assignments.second.iter())
            .map(|entry| entry.object_id())
            .collect();
        seen.sort_unstable();
        let mut expected = ids.to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
        assert!(assignments
            .first
            .iter()
            .any(|entry| entry.object_id() == assignments.first_routing));
        assert!(assignments
            .second
            .iter()
            .any(|entry| entry.object_id() == assignments.second_routing));
    }

    fn all_kinds() -> Vec<SplitKind> {
        vec![
            SplitKind::Random { seed: 7 },
            SplitKind::FarthestPoints,
            SplitKind::MRad,
            SplitKind::MMRad,
            SplitKind::MlbDist,
            SplitKind::Mst,
        ]
    }

    #[test]
    fn test_every_strategy_produces_a_complete_partition() {
        for kind in all_kinds() {
            for n in 2..=8 {
                let ids: Vec<ObjectId> = (0..n).collect();
                let node = leaf_node(&ids);
                let metric = line_metric(n);
                let mut strategy: SplitStrategy = kind.into();
                for distribution in [
                    DistributionStrategy::Balanced,
                    DistributionStrategy::GeneralizedHyperplane,
                ] {
                    let assignments = strategy.split(&node, &metric, distribution).unwrap();
                    assert_complete(&assignments, &ids);
                }
            }
        }
    }

    #[test]
    fn test_two_entry_node_splits_trivially() {
        for kind in all_kinds() {
            let node = leaf_node(&[4, 9]);
            let metric = line_metric(10);
            let mut strategy: SplitStrategy = kind.into();
            let assignments = strategy
                .split(&node, &metric, DistributionStrategy::Balanced)
                .unwrap();
            assert_eq!(assignments.first_routing, 4);
            assert_eq!(assignments.second_routing, 9);
            assert_eq!(assignments.first.len(), 1);
            assert_eq!(assignments.second.len(), 1);
            assert_eq!(assignments.first_radius, 0.0);
            assert_eq!(assignments.second_radius, 0.0);
        }
    }

    #[test]
    fn test_undersized_node_cannot_split() {
        let node = leaf_node(&[1]);
        let metric = line_metric(2);
        let mut strategy: SplitStrategy = SplitKind::FarthestPoints.into();
        assert!(matches!(
            strategy.split(&node, &metric, DistributionStrategy::Balanced),
            Err(MTreeError::InvariantViolation(_))
        ));
    }
}
