//! In-memory recordings

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::DataError;
use crate::types::{IntervalFeature, IntervalTable, MovementTrace, SubjectDay};

use super::{IntervalSource, MovementSource};

/// Recordings already materialized in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    intervals: HashMap<IntervalFeature, Arc<IntervalTable>>,
    movements: HashMap<SubjectDay, MovementTrace>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the interval table of its feature
    pub fn insert_intervals(&mut self, table: impl Into<Arc<IntervalTable>>) {
        let table = table.into();
        self.intervals.insert(table.feature(), table);
    }

    pub fn insert_movement(&mut self, subject: SubjectDay, trace: MovementTrace) {
        self.movements.insert(subject, trace);
    }

    /// Builder form of [`MemoryStore::insert_intervals`]
    pub fn with_intervals(mut self, table: impl Into<Arc<IntervalTable>>) -> Self {
        self.insert_intervals(table);
        self
    }

    /// Builder form of [`MemoryStore::insert_movement`]
    pub fn with_movement(mut self, subject: SubjectDay, trace: MovementTrace) -> Self {
        self.insert_movement(subject, trace);
        self
    }

    pub fn has_intervals(&self, feature: IntervalFeature) -> bool {
        self.intervals.contains_key(&feature)
    }

    /// Copy the tables of `features` from another source, skipping those
    /// already held
    pub fn preload_intervals<S>(
        &mut self,
        source: &S,
        features: &[IntervalFeature],
    ) -> Result<(), DataError>
    where
        S: IntervalSource + ?Sized,
    {
        for &feature in features {
            if self.has_intervals(feature) {
                continue;
            }
            debug!("caching interval table for {}", feature);
            let table = source.intervals(feature)?;
            self.intervals.insert(feature, table);
        }
        Ok(())
    }

    /// Number of cached interval tables
    pub fn interval_tables(&self) -> usize {
        self.intervals.len()
    }

    pub fn clear_intervals(&mut self) {
        self.intervals.clear();
    }
}

impl IntervalSource for MemoryStore {
    fn intervals(&self, feature: IntervalFeature) -> Result<Arc<IntervalTable>, DataError> {
        match self.intervals.get(&feature) {
            Some(table) if !table.is_empty() => Ok(Arc::clone(table)),
            _ => Err(DataError::MissingIntervalData(feature.to_string())),
        }
    }
}

impl MovementSource for MemoryStore {
    fn movement(&self, subject: SubjectDay) -> Result<MovementTrace, DataError> {
        self.movements
            .get(&subject)
            .cloned()
            .ok_or_else(|| DataError::MissingMovementData(subject.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntervalRecord;

    fn as_table() -> IntervalTable {
        IntervalTable::new(
            IntervalFeature::ActiveState,
            vec![IntervalRecord::new(SubjectDay::new(0, 0, 0), 1.0, 2.0)],
        )
    }

    #[test]
    fn test_missing_and_empty_tables_are_errors() {
        let store = MemoryStore::new()
            .with_intervals(IntervalTable::new(IntervalFeature::Feeding, Vec::new()));

        assert!(matches!(
            store.intervals(IntervalFeature::ActiveState),
            Err(DataError::MissingIntervalData(_))
        ));
        assert!(matches!(
            store.intervals(IntervalFeature::Feeding),
            Err(DataError::MissingIntervalData(_))
        ));
    }

    #[test]
    fn test_preload_copies_once() {
        let source = MemoryStore::new().with_intervals(as_table());
        let mut cache = MemoryStore::new();

        cache
            .preload_intervals(&source, &[IntervalFeature::ActiveState])
            .unwrap();
        assert_eq!(cache.interval_tables(), 1);

        let a = cache.intervals(IntervalFeature::ActiveState).unwrap();
        let b = source.intervals(IntervalFeature::ActiveState).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let err = cache
            .preload_intervals(&source, &[IntervalFeature::ActiveState, IntervalFeature::Water])
            .unwrap_err();
        assert!(matches!(err, DataError::MissingIntervalData(_)));
    }

    #[test]
    fn test_missing_movement() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.movement(SubjectDay::new(1, 1, 1)),
            Err(DataError::MissingMovementData(_))
        ));
    }
}
