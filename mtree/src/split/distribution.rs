//! Partitioning of entries once two routing objects are promoted.

use crate::page::Entry;

use super::Assignments;

/// How the remaining entries are divided between two promoted routing
/// objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistributionStrategy {
    /// Alternately hands the nearest still-unassigned entry to each
    /// side, keeping the sides balanced in size.
    #[default]
    Balanced,
    /// Assigns every entry to its closer routing object; the first side
    /// wins ties. Sides can end up arbitrarily unbalanced.
    GeneralizedHyperplane,
}

impl DistributionStrategy {
    /// Partitions `entries` around the pivots at indices `first` and
    /// `second`. `row_first` and `row_second` hold the distances from
    /// each pivot to every entry, in entry order.
    pub fn distribute(
        &self,
        entries: &[Entry],
        first: usize,
        second: usize,
        row_first: &[f64],
        row_second: &[f64],
    ) -> Assignments {
        let mut first_side = vec![entries[first].clone()];
        let mut second_side = vec![entries[second].clone()];
        let mut first_radius = entries[first].radius_contribution(0.0);
        let mut second_radius = entries[second].radius_contribution(0.0);

        match self {
            DistributionStrategy::Balanced => {
                let candidates = |row: &[f64]| -> Vec<usize> {
                    let mut indices: Vec<usize> = (0..entries.len())
                        .filter(|&k| k != first && k != second)
                        .collect();
                    indices.sort_by(|&a, &b| row[a].total_cmp(&row[b]));
                    indices
                };
                let by_first = candidates(row_first);
                let by_second = candidates(row_second);

                let mut assigned = vec![false; entries.len()];
                assigned[first] = true;
                assigned[second] = true;
                let mut next_first = 0;
                let mut next_second = 0;
                let mut take_first = true;

                for _ in 0..entries.len() - 2 {
                    if take_first {
                        while assigned[by_first[next_first]] {
                            next_first += 1;
                        }
                        let k = by_first[next_first];
                        assigned[k] = true;
                        first_radius = first_radius.max(entries[k].radius_contribution(row_first[k]));
                        first_side.push(entries[k].clone());
                    } else {
                        while assigned[by_second[next_second]] {
                            next_second += 1;
                        }
                        let k = by_second[next_second];
                        assigned[k] = true;
                        second_radius =
                            second_radius.max(entries[k].radius_contribution(row_second[k]));
                        second_side.push(entries[k].clone());
                    }
                    take_first = !take_first;
                }
            }
            DistributionStrategy::GeneralizedHyperplane => {
                for k in 0..entries.len() {
                    if k == first || k == second {
                        continue;
                    }
                    if row_first[k] <= row_second[k] {
                        first_radius = first_radius.max(entries[k].radius_contribution(row_first[k]));
                        first_side.push(entries[k].clone());
                    } else {
                        second_radius =
                            second_radius.max(entries[k].radius_contribution(row_second[k]));
                        second_side.push(entries[k].clone());
                    }
                }
            }
        }

        Assignments {
            first_routing: entries[first].object_id(),
            second_routing: entries[second].object_id(),
            first: first_side,
            second: second_side,
            first_radius,
            second_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{cluster_metric, leaf_node};
    use super::super::distance_row;
    use super::*;
    use crate::distance::DistanceFunction;
    use crate::page::ObjectId;

    fn rows(ids: &[ObjectId], metric: &impl DistanceFunction, a: usize, b: usize) -> (Vec<f64>, Vec<f64>) {
        (distance_row(ids, metric, a), distance_row(ids, metric, b))
    }

    #[test]
    fn test_balanced_sides_differ_by_at_most_one() {
        for n in 3..=9u64 {
            let ids: Vec<ObjectId> = (0..n).collect();
            let node = leaf_node(&ids);
            let metric = super::super::tests::line_metric(n);
            let (row_a, row_b) = rows(&ids, &metric, 0, (n - 1) as usize);
            let assignments = DistributionStrategy::Balanced.distribute(
                &node.entries,
                0,
                (n - 1) as usize,
                &row_a,
                &row_b,
            );
            let diff = assignments.first.len() as i64 - assignments.second.len() as i64;
            assert!(diff.abs() <= 1, "unbalanced sides for n={}", n);
        }
    }

    #[test]
    fn test_balanced_takes_nearest_first() {
        // pivots 1 and 4: side of 1 gets its closest neighbor 2, side
        // of 4 gets 3
        let ids = [1u64, 2, 3, 4];
        let node = leaf_node(&ids);
        let metric = cluster_metric();
        let (row_a, row_b) = rows(&ids, &metric, 0, 3);
        let assignments =
            DistributionStrategy::Balanced.distribute(&node.entries, 0, 3, &row_a, &row_b);

        let first: Vec<ObjectId> = assignments.first.iter().map(|e| e.object_id()).collect();
        let second: Vec<ObjectId> = assignments.second.iter().map(|e| e.object_id()).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![4, 3]);
        assert_eq!(assignments.first_radius, 1.0);
        assert_eq!(assignments.second_radius, 1.0);
    }

    #[test]
    fn test_hyperplane_assigns_to_closer_pivot() {
        let ids = [1u64, 2, 3, 4];
        let node = leaf_node(&ids);
        let metric = cluster_metric();
        let (row_a, row_b) = rows(&ids, &metric, 0, 2);
        // pivots 1 and 3: 2 is closer to 1, 4 closer to 3
        let assignments = DistributionStrategy::GeneralizedHyperplane.distribute(
            &node.entries,
            0,
            2,
            &row_a,
            &row_b,
        );
        let first: Vec<ObjectId> = assignments.first.iter().map(|e| e.object_id()).collect();
        let second: Vec<ObjectId> = assignments.second.iter().map(|e| e.object_id()).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3, 4]);
    }

    #[test]
    fn test_hyperplane_ties_go_to_first_side() {
        // everything equidistant from both pivots
        let ids = [1u64, 2, 3, 4];
        let node = leaf_node(&ids);
        let row_a = [0.0, 5.0, 5.0, 5.0];
        let row_b = [5.0, 0.0, 5.0, 5.0];
        let assignments = DistributionStrategy::GeneralizedHyperplane.distribute(
            &node.entries,
            0,
            1,
            &row_a,
            &row_b,
        );
        assert_eq!(assignments.first.len(), 3);
        assert_eq!(assignments.second.len(), 1);
    }

    #[test]
    fn test_radii_cover_assigned_entries() {
        let ids: Vec<ObjectId> = (0..7).collect();
        let node = leaf_node(&ids);
        let metric = super::super::tests::line_metric(7);
        let (row_a, row_b) = rows(&ids, &metric, 2, 5);
        for strategy in [
            DistributionStrategy::Balanced,
            DistributionStrategy::GeneralizedHyperplane,
        ] {
            let assignments = strategy.distribute(&node.entries, 2, 5, &row_a, &row_b);
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
}
