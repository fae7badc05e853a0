//! Random promotion: two distinct pivots from a seeded RNG.
//!
//! The cheapest strategy, O(n) distance evaluations. Quality depends
//! entirely on luck; it mostly serves as a baseline.

use rand::rngs::StdRng;
use rand::Rng;

use crate::distance::DistanceFunction;
use crate::page::Node;

use super::{distance_row, object_ids, Assignments, DistributionStrategy};

pub(super) fn split<D: DistanceFunction>(
    node: &Node,
    metric: &D,
    distribution: DistributionStrategy,
    rng: &mut StdRng,
) -> Assignments {
    let n = node.entries.len();
    let first = rng.gen_range(0..n);
    let mut second = rng.gen_range(0..n);
    while second == first {
        second = rng.gen_range(0..n);
    }

    let ids = object_ids(node);
    let row_first = distance_row(&ids, metric, first);
    let row_second = distance_row(&ids, metric, second);
    distribution.distribute(&node.entries, first, second, &row_first, &row_second)
}
