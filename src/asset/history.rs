//! Bounded price history
//!
//! Keeps the most recent `capacity` samples in strictly increasing timestamp
//! order. Once full, each accepted append evicts the oldest sample.

use super::types::{OrderingViolation, PricePoint};
use std::collections::VecDeque;

/// Default number of samples retained per asset
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Time-ordered, fixed-capacity price history
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceHistory {
    /// Create an empty history holding at most `capacity` points
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild a history from stored points, dropping any that break ordering
    pub fn from_points(capacity: usize, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut history = Self::new(capacity);
        for point in points {
            if let Err(e) = history.append(point) {
                tracing::debug!(error = %e, "Dropping out-of-order stored point");
            }
        }
        history
    }

    /// Append a point, evicting the oldest when full
    ///
    /// Points not strictly newer than the latest stored point are rejected
    /// and leave the history untouched.
    pub fn append(&mut self, point: PricePoint) -> Result<(), OrderingViolation> {
        if let Some(latest) = self.points.back() {
            if point.timestamp <= latest.timestamp {
                return Err(OrderingViolation {
                    attempted: point.timestamp,
                    latest: latest.timestamp,
                });
            }
        }

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
        Ok(())
    }

    /// Oldest retained point
    pub fn earliest(&self) -> Option<&PricePoint> {
        self.points.front()
    }

    /// Most recent point
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// Lowest-priced point
    pub fn min(&self) -> Option<&PricePoint> {
        self.points.iter().min_by(|a, b| a.price.cmp(&b.price))
    }

    /// Highest-priced point
    pub fn max(&self) -> Option<&PricePoint> {
        self.points.iter().max_by(|a, b| a.price.cmp(&b.price))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
