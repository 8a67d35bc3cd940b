use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::outlier::OutlierSet;
use crate::vector::Vector;

/// One worker's cluster: who owns it, how many points it holds, where its
/// centroid is, and which members lie farthest from that centroid.
///
/// A cluster with population 0 has no centroid. Snapshots of other workers'
/// clusters are plain clones received by message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    pub identity: String,
    pub population: usize,
    pub dim: usize,
    pub centroid: Option<Vector>,
    pub outliers: OutlierSet,
}

impl ClusterState {
    /// Creates an empty cluster with no centroid.
    pub fn empty(identity: impl Into<String>, outlier_capacity: usize) -> Self {
        Self {
            identity: identity.into(),
            population: 0,
            dim: 0,
            centroid: None,
            outliers: OutlierSet::new(outlier_capacity),
        }
    }

    /// Creates a one-member cluster centred on `point`.
    pub fn singleton(identity: impl Into<String>, point: Vector, dim: usize) -> Self {
        Self {
            identity: identity.into(),
            population: 1,
            dim,
            centroid: Some(point),
            outliers: OutlierSet::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.population == 0
    }

    /// Recomputes centroid, population and outliers from `points`.
    ///
    /// With no points the cluster becomes empty: population 0, no centroid,
    /// no outliers. Dimensionality is kept from the last non-empty state.
    pub fn recompute(&mut self, points: &[Vector]) -> Result<()> {
        let capacity = self.outliers.capacity();
        match mean(points)? {
            Some(centroid) => {
                self.outliers = OutlierSet::rebuild(capacity, &centroid, points)?;
                self.population = points.len();
                self.dim = centroid.dim();
                self.centroid = Some(centroid);
            }
            None => {
                self.population = 0;
                self.centroid = None;
                self.outliers = OutlierSet::new(capacity);
            }
        }
        Ok(())
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} size={} dim={}", self.identity, self.population, self.dim)?;
        match &self.centroid {
            Some(c) => write!(f, " [{c}]"),
            None => f.write_str(" [ ]"),
        }
    }
}

/// Worker identity -> last known cluster snapshot, for every worker.
///
/// Ordered by identity so that iteration, and every rule that depends on it,
/// is the same on all workers.
pub type ClusterTable = BTreeMap<String, ClusterState>;

/// Coordinate-wise arithmetic mean. `None` for an empty slice.
pub fn mean(points: &[Vector]) -> Result<Option<Vector>> {
    let Some(first) = points.first() else {
        return Ok(None);
    };
    let mut sum = Vector::zeros(first.dim());
    for p in points {
        sum.add(p)?;
    }
    sum.divide(points.len() as f64);
    Ok(Some(sum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KMeansError;

    fn v(c: &[f64]) -> Vector {
        Vector::new(c.to_vec())
    }

    #[test]
    fn mean_of_points() {
        let pts = vec![v(&[0.0, 0.0]), v(&[2.0, 4.0]), v(&[4.0, 2.0])];
        assert_eq!(mean(&pts).unwrap(), Some(v(&[2.0, 2.0])));
        assert_eq!(mean(&[]).unwrap(), None);
    }

    #[test]
    fn mean_rejects_mixed_dimensions() {
        let pts = vec![v(&[0.0, 0.0]), v(&[1.0])];
        assert!(matches!(
            mean(&pts),
            Err(KMeansError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn recompute_sets_population_and_outliers() {
        let mut c = ClusterState::empty("worker:000", 2);
        let pts = vec![v(&[0.0, 0.0]), v(&[0.0, 1.0]), v(&[0.0, 5.0])];
        c.recompute(&pts).unwrap();

        assert_eq!(c.population, 3);
        assert_eq!(c.dim, 2);
        assert_eq!(c.centroid, Some(v(&[0.0, 2.0])));
        assert_eq!(c.outliers.len(), 2);
        assert_eq!(c.outliers.farthest_first().next(), Some(&v(&[0.0, 5.0])));
    }

    #[test]
    fn recompute_with_no_points_empties_cluster() {
        let mut c = ClusterState::empty("worker:001", 2);
        c.recompute(&[v(&[1.0, 1.0])]).unwrap();
        assert!(!c.is_empty());

        c.recompute(&[]).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.centroid, None);
        assert!(c.outliers.is_empty());
        assert_eq!(c.outliers.capacity(), 2);
        assert_eq!(c.dim, 2);
    }

    #[test]
    fn display_format() {
        let c = ClusterState::singleton("worker:002", v(&[1.0, 2.5]), 2);
        assert_eq!(c.to_string(), "worker:002 size=1 dim=2 [1 2.5]");
        let e = ClusterState::empty("worker:003", 1);
        assert_eq!(e.to_string(), "worker:003 size=0 dim=0 [ ]");
    }
}
