//! Distance contract and the shared pairwise-distance matrix.

use std::collections::HashMap;

use crate::page::ObjectId;

/// The metric consumed by the tree.
///
/// Implementations must be symmetric and non-negative with
/// `distance(a, a) == 0`; search pruning additionally relies on the
/// triangle inequality.
pub trait DistanceFunction {
    fn distance(&self, a: ObjectId, b: ObjectId) -> f64;
}

/// Euclidean metric over registered vectors, keyed by object id.
/// Unregistered ids are infinitely far from everything.
#[derive(Debug, Clone, Default)]
pub struct EuclideanMetric {
    points: HashMap<ObjectId, Vec<f64>>,
}

impl EuclideanMetric {
    pub fn new() -> Self {
        EuclideanMetric::default()
    }

    pub fn register(&mut self, id: ObjectId, point: Vec<f64>) {
        self.points.insert(id, point);
    }
}

impl DistanceFunction for EuclideanMetric {
    fn distance(&self, a: ObjectId, b: ObjectId) -> f64 {
        match (self.points.get(&a), self.points.get(&b)) {
            (Some(p), Some(q)) => p
                .iter()
                .zip(q.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            _ => f64::INFINITY,
        }
    }
}

/// Metric backed by an explicit symmetric distance table.
#[derive(Debug, Clone, Default)]
pub struct TableMetric {
    distances: HashMap<(ObjectId, ObjectId), f64>,
}

impl TableMetric {
    pub fn new() -> Self {
        TableMetric::default()
    }

    /// Records the distance between `a` and `b` in both directions.
    pub fn set(&mut self, a: ObjectId, b: ObjectId, distance: f64) {
        self.distances.insert((a.min(b), a.max(b)), distance);
    }
}

impl DistanceFunction for TableMetric {
    fn distance(&self, a: ObjectId, b: ObjectId) -> f64 {
        if a == b {
            return 0.0;
        }
        self.distances
            .get(&(a.min(b), a.max(b)))
            .copied()
            .unwrap_or(f64::INFINITY)
    }
}

/// Symmetric pairwise-distance matrix over a slice of objects.
///
/// Every off-diagonal pair is evaluated exactly once and mirrored; the
/// split heuristics share one matrix instead of re-evaluating the
/// metric.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn from_objects<D: DistanceFunction + ?Sized>(ids: &[ObjectId], metric: &D) -> Self {
        let n = ids.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = metric.distance(ids[i], ids[j]);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        DistanceMatrix { n, data }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// All distances from the object at index `i`, in index order.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}
