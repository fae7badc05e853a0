//! Maximum-lower-bound-on-distance promotion.
//!
//! Reuses the parent distances already stored in the entries: the entry
//! closest to the old routing object and the entry farthest from it
//! become the new pivots, costing only O(n) fresh distance evaluations.
//! Root nodes carry no parent distances and fall back to the
//! farthest-points promotion.

use crate::distance::DistanceFunction;
use crate::page::Node;

use super::{distance_row, farthest, object_ids, Assignments, DistributionStrategy};

pub(super) fn split<D: DistanceFunction>(
    node: &Node,
    metric: &D,
    distribution: DistributionStrategy,
) -> Assignments {
    let parent_distances: Option<Vec<f64>> = node
        .entries
        .iter()
        .map(|entry| entry.parent_distance())
        .collect();
    let Some(parent_distances) = parent_distances else {
        return farthest::split(node, metric, distribution);
    };

    let mut min_index = 0;
    let mut max_index = 0;
    for (k, &distance) in parent_distances.iter().enumerate() {
        if distance < parent_distances[min_index] {
            min_index = k;
        }
        if distance > parent_distances[max_index] {
            max_index = k;
        }
    }
    if min_index == max_index {
        // all parent distances equal, take any other entry as far pivot
        max_index = if min_index == 0 { 1 } else { 0 };
    }

    let ids = object_ids(node);
    let row_min = distance_row(&ids, metric, min_index);
    let row_max = distance_row(&ids, metric, max_index);
    distribution.distribute(&node.entries, min_index, max_index, &row_min, &row_max)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{
        assert_complete, cluster_metric, leaf_node, leaf_node_with_parents,
    };
    use super::super::{DistributionStrategy, SplitKind, SplitStrategy};
    use crate::page::ObjectId;

    #[test]
    fn test_promotes_min_and_max_parent_distance() {
        // A=1 pd 2, B=2 pd 7, C=3 pd 1, D=4 pd 8
        let node = leaf_node_with_parents(&[(1, 2.0), (2, 7.0), (3, 1.0), (4, 8.0)]);
        let metric = cluster_metric();
        let mut strategy: SplitStrategy = SplitKind::MlbDist.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        assert_eq!(assignments.first_routing, 3);
        assert_eq!(assignments.second_routing, 4);
        assert_complete(&assignments, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_first_extreme_wins_ties() {
        let node = leaf_node_with_parents(&[(1, 1.0), (2, 1.0), (3, 9.0), (4, 9.0)]);
        let metric = cluster_metric();
        let mut strategy: SplitStrategy = SplitKind::MlbDist.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        assert_eq!(assignments.first_routing, 1);
        assert_eq!(assignments.second_routing, 3);
    }

    #[test]
    fn test_root_node_falls_back_to_farthest_points() {
        // no parent distances anywhere, as in a root node
        let ids: Vec<ObjectId> = vec![1, 2, 3, 4];
        let node = leaf_node(&ids);
        let metric = cluster_metric();
        let mut strategy: SplitStrategy = SplitKind::MlbDist.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        // matches the farthest-points choice on the same node
        assert_eq!(assignments.first_routing, 1);
        assert_eq!(assignments.second_routing, 3);
        assert_complete(&assignments, &ids);
    }

    #[test]
    fn test_equal_parent_distances_still_split() {
        let node = leaf_node_with_parents(&[(1, 3.0), (2, 3.0), (3, 3.0), (4, 3.0)]);
        let metric = cluster_metric();
        let mut strategy: SplitStrategy = SplitKind::MlbDist.into();
        let assignments = strategy
            .split(&node, &metric, DistributionStrategy::Balanced)
            .unwrap();
        assert_ne!(assignments.first_routing, assignments.second_routing);
        assert_complete(&assignments, &[1, 2, 3, 4]);
    }
}
