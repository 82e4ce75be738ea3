//! Interval membership
//!
//! An [`IntervalSet`] holds the episodes of one behavior for one subject-day
//! and answers whether timestamps fall strictly inside any of them. Episodes
//! are open intervals: a timestamp equal to a boundary is never contained.

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// A behavioral episode spanning `(start, stop)`, both ends excluded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub stop: f64,
}

impl Interval {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start < t && t < self.stop
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

impl From<(f64, f64)> for Interval {
    fn from((start, stop): (f64, f64)) -> Self {
        Self::new(start, stop)
    }
}

/// Immutable set of disjoint open intervals
///
/// Construction validates every interval and rejects overlaps, then keeps a
/// start-sorted copy so that point queries cost `O(log n)`. The supplied
/// order is preserved for iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
    by_start: Vec<Interval>,
}

impl IntervalSet {
    /// Build a set from intervals of a single subject-day and feature.
    ///
    /// # Errors
    /// `InvalidInterval` if a bound is not finite, if `start >= stop`, or if
    /// two intervals overlap. Intervals that only touch are accepted.
    pub fn new<I, T>(intervals: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Interval>,
    {
        let intervals: Vec<Interval> = intervals.into_iter().map(Into::into).collect();

        for (i, iv) in intervals.iter().enumerate() {
            if !iv.start.is_finite() || !iv.stop.is_finite() {
                return Err(DataError::InvalidInterval(format!(
                    "interval {} ({}, {}) has a non-finite bound",
                    i, iv.start, iv.stop
                )));
            }
            if iv.start >= iv.stop {
                return Err(DataError::InvalidInterval(format!(
                    "interval {} ({}, {}) does not satisfy start < stop",
                    i, iv.start, iv.stop
                )));
            }
        }

        let mut by_start = intervals.clone();
        by_start.sort_by(|a, b| a.start.total_cmp(&b.start));

        if let Some(w) = by_start.windows(2).find(|w| w[1].start < w[0].stop) {
            return Err(DataError::InvalidInterval(format!(
                "intervals ({}, {}) and ({}, {}) overlap",
                w[0].start, w[0].stop, w[1].start, w[1].stop
            )));
        }

        Ok(Self {
            intervals,
            by_start,
        })
    }

    /// A set with no intervals; every query answers `false`
    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff some interval has `start < t < stop`
    pub fn contains(&self, t: f64) -> bool {
        // index one past the last interval starting strictly before t
        let idx = self.by_start.partition_point(|iv| iv.start < t);
        idx > 0 && t < self.by_start[idx - 1].stop
    }

    /// Membership of every timestamp, in the order given.
    ///
    /// Non-decreasing input is answered with one merged sweep over the
    /// intervals; anything else falls back to a binary search per element.
    pub fn contains_all(&self, times: &[f64]) -> Vec<bool> {
        if self.by_start.is_empty() {
            return vec![false; times.len()];
        }

        // NaN fails the comparison, so traces containing NaN take the slow path
        let sorted = times.windows(2).all(|w| w[0] <= w[1]);
        if !sorted {
            return times.iter().map(|&t| self.contains(t)).collect();
        }

        let mut out = Vec::with_capacity(times.len());
        let mut idx = 0;
        for &t in times {
            while idx < self.by_start.len() && self.by_start[idx].start < t {
                idx += 1;
            }
            out.push(idx > 0 && t < self.by_start[idx - 1].stop);
        }
        out
    }

    /// Intervals in the order they were supplied
    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Summed length of all episodes
    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(Interval::duration).sum()
    }

    /// Earliest start and latest stop, if the set is non-empty
    pub fn span(&self) -> Option<Interval> {
        let first = self.by_start.first()?;
        let last = self.by_start.last()?;
        Some(Interval::new(first.start, last.stop))
    }
}
