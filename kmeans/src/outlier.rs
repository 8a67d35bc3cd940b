use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::vector::Vector;

/// A point retained as a reseed candidate, with its distance to the centroid
/// it was measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub point: Vector,
    pub distance: f64,
}

/// Bounded set of the points farthest from a centroid.
///
/// Entries are kept ascending by distance, so the nearest retained entry is
/// evicted first and the farthest sits at the end. Capacity is k-1 for a run
/// with k clusters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierSet {
    capacity: usize,
    entries: Vec<Outlier>,
}

impl OutlierSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Builds the set from scratch over `points`, measured against `centroid`.
    pub fn rebuild<'a, I>(capacity: usize, centroid: &Vector, points: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Vector>,
    {
        let mut set = Self::new(capacity);
        for p in points {
            let d = p.distance(centroid)?;
            set.offer(p, d);
        }
        Ok(set)
    }

    /// Offers a candidate. Returns true if it was kept.
    ///
    /// While the set has free slots every candidate is kept. Once full, a
    /// candidate replaces the current minimum only if strictly farther.
    pub fn offer(&mut self, point: &Vector, distance: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.is_full() {
            if distance <= self.entries[0].distance {
                return false;
            }
            self.entries.remove(0);
        }
        let pos = self.entries.partition_point(|e| e.distance <= distance);
        self.entries.insert(
            pos,
            Outlier {
                point: point.clone(),
                distance,
            },
        );
        true
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Entries in ascending distance order.
    pub fn entries(&self) -> &[Outlier] {
        &self.entries
    }

    /// Retained points, farthest first.
    pub fn farthest_first(&self) -> impl Iterator<Item = &Vector> {
        self.entries.iter().rev().map(|e| &e.point)
    }
}
