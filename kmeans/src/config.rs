use serde::{Deserialize, Serialize};

use crate::convergence::DEFAULT_EPSILON;
use crate::error::{KMeansError, Result};

/// Controls a clustering run. Every worker must be started with the same
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of clusters, which is also the number of workers.
    pub k: usize,

    /// Upper bound on the number of rounds.
    pub max_iterations: usize,

    /// Per-coordinate tolerance for centroid equality.
    /// Default: 0.01.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Seed for the initial random partition. Entropy-seeded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

impl Config {
    pub fn new(k: usize, max_iterations: usize) -> Self {
        Self {
            k,
            max_iterations,
            epsilon: DEFAULT_EPSILON,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Rejects values no run can start with.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(KMeansError::Config("k must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(KMeansError::Config("max_iterations must be positive".into()));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(KMeansError::Config(format!(
                "epsilon must be a positive number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Capacity of each cluster's outlier set.
    pub fn outlier_capacity(&self) -> usize {
        self.k.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_sane_values() {
        assert!(Config::new(3, 10).validate().is_ok());
        assert_eq!(Config::new(3, 10).outlier_capacity(), 2);
        assert_eq!(Config::new(1, 10).outlier_capacity(), 0);
    }

    #[test]
    fn validate_rejects_zero_k_and_iterations() {
        assert!(matches!(
            Config::new(0, 10).validate(),
            Err(KMeansError::Config(_))
        ));
        assert!(matches!(
            Config::new(2, 0).validate(),
            Err(KMeansError::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_epsilon() {
        assert!(Config::new(2, 5).with_epsilon(0.0).validate().is_err());
        assert!(Config::new(2, 5).with_epsilon(-1.0).validate().is_err());
        assert!(Config::new(2, 5).with_epsilon(f64::NAN).validate().is_err());
    }

    #[test]
    fn deserialize_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"k": 4, "max_iterations": 20}"#).unwrap();
        assert_eq!(cfg.epsilon, 0.01);
        assert_eq!(cfg.seed, None);

        let cfg: Config =
            serde_json::from_str(r#"{"k": 2, "max_iterations": 5, "epsilon": 0.5, "seed": 7}"#)
                .unwrap();
        assert_eq!(cfg, Config::new(2, 5).with_epsilon(0.5).with_seed(7));
    }

    #[test]
    fn negative_k_is_rejected_at_parse() {
        assert!(serde_json::from_str::<Config>(r#"{"k": -1, "max_iterations": 5}"#).is_err());
    }
}
