use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KMeansError, Result};

/// A point in n-dimensional space.
///
/// Dimensionality is fixed at construction. Every binary operation checks it
/// and fails with [`KMeansError::DimensionMismatch`] rather than truncating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    coords: Vec<f64>,
}

impl Vector {
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    /// Returns the all-zero vector of the given dimensionality.
    pub fn zeros(dim: usize) -> Self {
        Self {
            coords: vec![0.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Vector) -> Result<f64> {
        self.check_dim(other)?;
        let sum: f64 = self
            .coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(sum.sqrt())
    }

    /// Adds `other` coordinate-wise, in place.
    pub fn add(&mut self, other: &Vector) -> Result<()> {
        self.check_dim(other)?;
        for (a, b) in self.coords.iter_mut().zip(&other.coords) {
            *a += b;
        }
        Ok(())
    }

    /// Divides every coordinate by `n`, in place. Used to turn a sum of `n`
    /// points into their mean.
    pub fn divide(&mut self, n: f64) {
        for a in self.coords.iter_mut() {
            *a /= n;
        }
    }

    /// Reports whether every coordinate pair differs by strictly less than `eps`.
    /// Stops at the first coordinate that does not.
    pub fn approx_eq(&self, other: &Vector, eps: f64) -> Result<bool> {
        self.check_dim(other)?;
        Ok(self
            .coords
            .iter()
            .zip(&other.coords)
            .all(|(a, b)| (a - b).abs() < eps))
    }

    fn check_dim(&self, other: &Vector) -> Result<()> {
        if self.dim() != other.dim() {
            return Err(KMeansError::DimensionMismatch {
                expected: self.dim(),
                got: other.dim(),
            });
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Vector {
    fn from(coords: Vec<f64>) -> Self {
        Self::new(coords)
    }
}

impl FromStr for Vector {
    type Err = KMeansError;

    /// Parses whitespace- and/or comma-separated coordinates.
    fn from_str(s: &str) -> Result<Self> {
        let coords = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| KMeansError::MalformedRecord(format!("bad coordinate {tok:?}")))
            })
            .collect::<Result<Vec<f64>>>()?;
        if coords.is_empty() {
            return Err(KMeansError::MalformedRecord("no coordinates".into()));
        }
        Ok(Self { coords })
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(c: &[f64]) -> Vector {
        Vector::new(c.to_vec())
    }

    #[test]
    fn distance_is_euclidean() {
        let d = v(&[0.0, 0.0]).distance(&v(&[3.0, 4.0])).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
        assert_eq!(v(&[1.0, 2.0]).distance(&v(&[1.0, 2.0])).unwrap(), 0.0);
    }

    #[test]
    fn add_and_divide() {
        let mut a = v(&[1.0, 2.0]);
        a.add(&v(&[3.0, 4.0])).unwrap();
        assert_eq!(a, v(&[4.0, 6.0]));
        a.divide(2.0);
        assert_eq!(a, v(&[2.0, 3.0]));
    }

    #[test]
    fn mismatched_dimensions_fail() {
        let mut a = v(&[1.0, 2.0]);
        let b = v(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            a.distance(&b),
            Err(KMeansError::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert!(a.add(&b).is_err());
        assert!(a.approx_eq(&b, 0.01).is_err());
        // Operand left untouched after a failed add.
        assert_eq!(a, v(&[1.0, 2.0]));
    }

    #[test]
    fn approx_eq_is_strict_per_coordinate() {
        let a = v(&[1.0, 1.0]);
        assert!(a.approx_eq(&v(&[1.005, 0.995]), 0.01).unwrap());
        assert!(!a.approx_eq(&v(&[1.0, 1.02]), 0.01).unwrap());
        assert!(!a.approx_eq(&v(&[1.0, 1.0 + 0.0625]), 0.0625).unwrap());
    }

    #[test]
    fn parse_records() {
        assert_eq!("1 2.5".parse::<Vector>().unwrap(), v(&[1.0, 2.5]));
        assert_eq!("1,2, 3".parse::<Vector>().unwrap(), v(&[1.0, 2.0, 3.0]));
        assert_eq!("\t-4\t5 ".parse::<Vector>().unwrap(), v(&[-4.0, 5.0]));
        assert!(matches!(
            "1 abc".parse::<Vector>(),
            Err(KMeansError::MalformedRecord(_))
        ));
        assert!("   ".parse::<Vector>().is_err());
        assert!("1 NaN".parse::<Vector>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let a = v(&[0.5, -10.0, 3.25]);
        assert_eq!(a.to_string(), "0.5 -10 3.25");
        assert_eq!(a.to_string().parse::<Vector>().unwrap(), a);
    }
}
