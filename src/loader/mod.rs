//! Recording loaders
//!
//! This module provides sources that materialize interval tables and movement
//! traces in memory: an on-disk [`DataStore`] reading the `.npy` layout, and
//! an in-memory [`MemoryStore`] used for caching and tests.

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{DataStore, SUMMARY_FILE};

use std::sync::Arc;

use crate::error::DataError;
use crate::types::{IntervalFeature, IntervalTable, MovementTrace, SubjectDay};

/// Source of per-feature interval tables
pub trait IntervalSource: Send + Sync {
    /// All episodes of `feature` across every subject-day.
    ///
    /// Fails with `MissingIntervalData` when the source holds nothing at all
    /// for the feature.
    fn intervals(&self, feature: IntervalFeature) -> Result<Arc<IntervalTable>, DataError>;
}

/// Source of per-subject-day movement traces
pub trait MovementSource: Send + Sync {
    fn movement(&self, subject: SubjectDay) -> Result<MovementTrace, DataError>;
}
