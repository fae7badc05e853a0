//! Farthest-points promotion: the globally farthest pair of entries.
//!
//! Builds the full pairwise matrix and scans it row-major; on equal
//! separations the first pair found stays promoted.

use crate::distance::{DistanceFunction, DistanceMatrix};
use crate::page::Node;

use super::{object_ids, Assignments, DistributionStrategy};

pub(super) fn split<D: DistanceFunction>(
    node: &Node,
    metric: &D,
    distribution: DistributionStrategy,
) -> Assignments {
    let ids = object_ids(node);
    let matrix = DistanceMatrix::from_objects(&ids, metric);
    split_with_matrix(node, &matrix, distribution)
}

pub(super) fn split_with_matrix(
    node: &Node,
    matrix: &DistanceMatrix,
    distribution: DistributionStrategy,
) -> Assignments {
    let n = matrix.len();
    let mut best = (0, 1);
    let mut best_distance = matrix.get(0, 1);
    for i in 0..n {
        for j in (i + 1)..n {
            if matrix.get(i, j) > best_distance {
                best = (i, j);
                best_distance = matrix.get(i, j);
            }
        }
    }
    distribution.distribute(
        &node.entries,
        best.0,
        best.1,
        matrix.row(best.0),
        matrix.row(best.1),
    )
}
