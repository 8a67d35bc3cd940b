use crate::cluster::ClusterTable;
use crate::error::Result;

/// Default per-coordinate tolerance for centroid equality.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// Decides whether the global cluster table stopped moving between rounds.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceChecker {
    epsilon: f64,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl ConvergenceChecker {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Compares the previous table with the set received this round.
    ///
    /// Converged only if both tables have the same size, no cluster in either
    /// is empty, and every shared identity's centroids agree on every
    /// coordinate within epsilon. An identity present in one table but not
    /// the other counts as movement.
    pub fn check(&self, previous: &ClusterTable, received: &ClusterTable) -> Result<bool> {
        if previous.len() != received.len() {
            return Ok(false);
        }
        if previous.values().chain(received.values()).any(|c| c.is_empty()) {
            return Ok(false);
        }
        for (identity, old) in previous {
            let Some(new) = received.get(identity) else {
                return Ok(false);
            };
            let (Some(a), Some(b)) = (&old.centroid, &new.centroid) else {
                return Ok(false);
            };
            if !a.approx_eq(b, self.epsilon)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
