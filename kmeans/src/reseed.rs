//! Empty-cluster repair.
//!
//! A cluster that lost all of its points has no centroid, so nothing would
//! ever be assigned back to it. Each empty cluster is restarted as a
//! singleton centred on one of the donor cluster's outliers, where the donor
//! is the most populous cluster (smallest identity on ties).

use crate::cluster::{ClusterState, ClusterTable};
use crate::error::{KMeansError, Result};
use crate::vector::Vector;

/// One empty cluster that was given a new centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Reseed {
    pub identity: String,
    pub donor: String,
    pub centroid: Vector,
}

/// Replaces every empty cluster in `table` with a singleton drawn from the
/// donor's outliers, farthest outlier first.
///
/// Returns the repairs made, in identity order. Fails with
/// [`KMeansError::InsufficientOutliers`] when the donor holds fewer outliers
/// than there are empty clusters; the table is left untouched in that case.
pub fn reseed(table: &mut ClusterTable) -> Result<Vec<Reseed>> {
    let empty: Vec<String> = table
        .values()
        .filter(|c| c.is_empty())
        .map(|c| c.identity.clone())
        .collect();
    if empty.is_empty() {
        return Ok(Vec::new());
    }

    let mut donor: Option<&ClusterState> = None;
    for c in table.values().filter(|c| !c.is_empty()) {
        if donor.is_none_or(|d| c.population > d.population) {
            donor = Some(c);
        }
    }
    let Some(donor) = donor else {
        return Err(KMeansError::InsufficientOutliers {
            empty: empty.len(),
            available: 0,
        });
    };
    if empty.len() > donor.outliers.len() {
        return Err(KMeansError::InsufficientOutliers {
            empty: empty.len(),
            available: donor.outliers.len(),
        });
    }

    let dim = donor.dim;
    let repairs: Vec<Reseed> = empty
        .into_iter()
        .zip(donor.outliers.farthest_first())
        .map(|(identity, point)| Reseed {
            identity,
            donor: donor.identity.clone(),
            centroid: point.clone(),
        })
        .collect();

    for r in &repairs {
        table.insert(
            r.identity.clone(),
            ClusterState::singleton(r.identity.clone(), r.centroid.clone(), dim),
        );
    }
    Ok(repairs)
}
