//! Minimal-radii promotion: exhaustive search over all pivot pairs.
//!
//! Every pair of entries is tried as a promotion, the configured
//! distribution partitions the rest, and the pair minimizing the radius
//! cost wins. MRad minimizes the sum of the two covering radii, mMRad
//! their maximum. O(n^3) distance lookups over the shared matrix.

use crate::distance::{DistanceFunction, DistanceMatrix};
use crate::page::Node;

use super::{object_ids, Assignments, DistributionStrategy};

#[derive(Debug, Clone, Copy)]
pub(super) enum Cost {
    /// Sum of the two covering radii (MRad)
    Sum,
    /// Maximum of the two covering radii (mMRad)
    Max,
}

impl Cost {
    fn of(&self, assignments: &Assignments) -> f64 {
        match self {
            Cost::Sum => assignments.first_radius + assignments.second_radius,
            Cost::Max => assignments.first_radius.max(assignments.second_radius),
        }
    }
}

pub(super) fn split<D: DistanceFunction>(
    node: &Node,
    metric: &D,
    distribution: DistributionStrategy,
    cost: Cost,
) -> Assignments {
    let ids = object_ids(node);
    let matrix = DistanceMatrix::from_objects(&ids, metric);
    let n = matrix.len();

    let mut best = distribution.distribute(&node.entries, 0, 1, matrix.row(0), matrix.row(1));
    let mut best_cost = cost.of(&best);

    for i in 0..n {
        for j in (i + 1)..n {
            if (i, j) == (0, 1) {
                continue;
            }
            let candidate =
                distribution.distribute(&node.entries, i, j, matrix.row(i), matrix.row(j));
            let candidate_cost = cost.of(&candidate);
            // only a strictly smaller cost replaces the incumbent, so
            // the first pair reaching the optimum is kept
            if candidate_cost < best_cost {
                best = candidate;
                best_cost = candidate_cost;
            }
        }
    }
    best
}
