//! Pipeline orchestration
//!
//! This module provides the public entry points that compose loading and
//! annotation: movement trace → interval tables → membership columns.

use log::info;
use rayon::prelude::*;

use crate::annotator::TrajectoryAnnotator;
use crate::config::Config;
use crate::error::DataError;
use crate::loader::{DataStore, IntervalSource, MemoryStore, MovementSource};
use crate::types::{AnnotatedTrace, IntervalFeature, IntoSubjectDay, SubjectDay};

/// Load one subject-day's movement trace and attach the named interval
/// features.
///
/// # Arguments
/// * `store` - Data directory to read from
/// * `key` - Subject-day, e.g. `(1i64, 2i64, 1i64)` or a [`SubjectDay`]
/// * `features` - Feature names out of `AS, F, IS, M_AS, M_IS, W`; empty adds
///   no columns
///
/// # Example
/// ```ignore
/// let store = DataStore::new("data");
/// let trace = load_movement_and_intervals(&store, (1i64, 1i64, 1i64), &["AS"])?;
/// ```
pub fn load_movement_and_intervals<K, N>(
    store: &DataStore,
    key: K,
    features: &[N],
) -> Result<AnnotatedTrace, DataError>
where
    K: IntoSubjectDay,
    N: AsRef<str>,
{
    let subject = key.into_subject_day()?;
    let features = IntervalFeature::parse_list(features)?;
    let movement = store.load_movement(subject)?;
    TrajectoryAnnotator::new(store).annotate_features(subject, &movement, &features)
}

/// [`load_movement_and_intervals`] with every recognized feature
pub fn load_movement_and_all_intervals<K: IntoSubjectDay>(
    store: &DataStore,
    key: K,
) -> Result<AnnotatedTrace, DataError> {
    let names: Vec<&str> = IntervalFeature::ALL.iter().map(|f| f.as_str()).collect();
    load_movement_and_intervals(store, key, &names)
}

/// Annotates many subject-days against a fixed feature list.
///
/// Interval tables are loaded once and kept for the lifetime of the
/// processor, so traces of different mice share them.
pub struct MovementProcessor<S = DataStore> {
    source: S,
    features: Vec<IntervalFeature>,
    parallel: bool,
    cache: MemoryStore,
}

impl MovementProcessor<DataStore> {
    /// Processor over the configured data directory and feature list
    pub fn from_config(config: &Config) -> Self {
        Self::new(DataStore::from_config(config), config.features.clone())
            .with_parallel(config.parallel)
    }
}

impl<S> MovementProcessor<S>
where
    S: IntervalSource + MovementSource,
{
    pub fn new(source: S, features: Vec<IntervalFeature>) -> Self {
        Self {
            source,
            features,
            parallel: true,
            cache: MemoryStore::new(),
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn features(&self) -> &[IntervalFeature] {
        &self.features
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of interval tables currently cached
    pub fn cached_tables(&self) -> usize {
        self.cache.interval_tables()
    }

    /// Drop cached interval tables so the next call reloads them
    pub fn clear_cache(&mut self) {
        self.cache.clear_intervals();
    }

    /// Annotate one subject-day
    pub fn annotate<K: IntoSubjectDay>(&mut self, key: K) -> Result<AnnotatedTrace, DataError> {
        let subject = key.into_subject_day()?;
        self.cache.preload_intervals(&self.source, &self.features)?;
        self.annotate_cached(subject)
    }

    /// Annotate several subject-days; results follow `subjects` order.
    ///
    /// The first failure is returned and no traces are.
    pub fn annotate_many(&mut self, subjects: &[SubjectDay]) -> Result<Vec<AnnotatedTrace>, DataError> {
        self.cache.preload_intervals(&self.source, &self.features)?;

        let traces = if self.parallel {
            subjects
                .par_iter()
                .map(|s| self.annotate_cached(*s))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            subjects
                .iter()
                .map(|s| self.annotate_cached(*s))
                .collect::<Result<Vec<_>, _>>()?
        };

        info!(
            "annotated {} subject-days with {} features",
            traces.len(),
            self.features.len()
        );
        Ok(traces)
    }

    fn annotate_cached(&self, subject: SubjectDay) -> Result<AnnotatedTrace, DataError> {
        let movement = self.source.movement(subject)?;
        TrajectoryAnnotator::new(&self.cache)
            .with_parallel(self.parallel)
            .annotate_features(subject, &movement, &self.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npy::{write_npy_bool_file, write_npy_f64_file};
    use crate::types::{IntervalRecord, IntervalTable, MovementTrace};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const TIMES: [f64; 3] = [56448.333, 56448.653, 56449.273];

    fn write_fixture(root: &Path) {
        let store = DataStore::new(root);
        let subject = SubjectDay::new(1, 1, 1);
        for component in ["CT", "CX", "CY", "C_idx_HB"] {
            fs::create_dir_all(root.join("txy_coords").join(component)).unwrap();
        }
        write_npy_f64_file(&store.movement_path("CT", subject), &[3], &TIMES).unwrap();
        write_npy_f64_file(&store.movement_path("CX", subject), &[3], &[-6.289, -5.509, -5.048])
            .unwrap();
        write_npy_f64_file(&store.movement_path("CY", subject), &[3], &[34.902, 34.173, 33.284])
            .unwrap();
        write_npy_bool_file(&store.movement_path("C_idx_HB", subject), &[3], &[true, false, false])
            .unwrap();

        for (feature, pairs) in [
            ("AS", vec![56448.5, 56450.0]),
            ("F", vec![]),
            ("IS", vec![56000.0, 56448.4]),
            ("M_AS", vec![56449.0, 56449.5]),
            ("M_IS", vec![56448.0, 56448.333]),
            ("W", vec![]),
        ] {
            let dir = store.intervals_dir(feature.parse().unwrap());
            fs::create_dir_all(&dir).unwrap();
            write_npy_f64_file(
                &dir.join(format!("{}_{}", feature, subject.file_suffix())),
                &[pairs.len() / 2, 2],
                &pairs,
            )
            .unwrap();
            // a second mouse keeps every table non-empty
            write_npy_f64_file(
                &dir.join(format!("{}_strain9_mouse0_day1.npy", feature)),
                &[1, 2],
                &[0.0, 1e6],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_load_movement_and_intervals_end_to_end() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let store = DataStore::new(tmp.path());

        let annotated = load_movement_and_intervals(&store, (1i64, 1i64, 1i64), &["AS"]).unwrap();
        assert_eq!(annotated.columns(), vec!["t", "x", "y", "isHB", "AS"]);
        assert_eq!(annotated.movement().home_base(), &[false, true, true]);
        assert_eq!(
            annotated.column(IntervalFeature::ActiveState).unwrap(),
            &[false, true, true]
        );
    }

    #[test]
    fn test_no_features_equals_movement() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let store = DataStore::new(tmp.path());

        let movement = store.load_movement((1i64, 1i64, 1i64)).unwrap();
        let annotated =
            load_movement_and_intervals::<_, &str>(&store, (1i64, 1i64, 1i64), &[]).unwrap();
        assert_eq!(annotated.into_movement(), movement);
    }

    #[test]
    fn test_all_features_default() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let store = DataStore::new(tmp.path());

        let annotated = load_movement_and_all_intervals(&store, SubjectDay::new(1, 1, 1)).unwrap();
        assert_eq!(
            annotated.columns(),
            vec!["t", "x", "y", "isHB", "AS", "F", "IS", "M_AS", "M_IS", "W"]
        );
        assert_eq!(annotated.column(IntervalFeature::Feeding).unwrap(), &[false; 3]);
        assert_eq!(
            annotated.column(IntervalFeature::InactiveState).unwrap(),
            &[true, false, false]
        );
        assert_eq!(
            annotated.column(IntervalFeature::MoveActiveState).unwrap(),
            &[false, false, true]
        );
        // 56448.333 is the stop of the only M_IS episode
        assert_eq!(
            annotated.column(IntervalFeature::MoveInactiveState).unwrap(),
            &[false; 3]
        );
    }

    #[test]
    fn test_entry_point_errors() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let store = DataStore::new(tmp.path());

        assert!(matches!(
            load_movement_and_intervals(&store, (1i64, 1i64, 1i64), &["XYZ"]),
            Err(DataError::InvalidFeature { .. })
        ));
        assert!(matches!(
            load_movement_and_intervals(&store, (-1i64, 0i64, 0i64), &["AS"]),
            Err(DataError::InvalidSubjectKey(_))
        ));
        assert!(matches!(
            load_movement_and_intervals(&store, (1.5f64, 0.0f64, 0.0f64), &["AS"]),
            Err(DataError::InvalidSubjectKey(_))
        ));
    }

    fn memory_source() -> MemoryStore {
        let a = SubjectDay::new(0, 0, 5);
        let b = SubjectDay::new(0, 1, 5);
        let trace = |t: Vec<f64>| {
            let n = t.len();
            MovementTrace::new(t, vec![0.0; n], vec![0.0; n], vec![false; n]).unwrap()
        };
        MemoryStore::new()
            .with_movement(a, trace(vec![1.0, 2.0, 3.0]))
            .with_movement(b, trace(vec![1.0, 2.0]))
            .with_intervals(IntervalTable::new(
                IntervalFeature::Feeding,
                vec![
                    IntervalRecord::new(a, 1.5, 2.5),
                    IntervalRecord::new(b, 0.0, 1.5),
                ],
            ))
    }

    #[test]
    fn test_processor_annotates_many_in_order() {
        let mut processor =
            MovementProcessor::new(memory_source(), vec![IntervalFeature::Feeding]);
        let subjects = [SubjectDay::new(0, 1, 5), SubjectDay::new(0, 0, 5)];

        let traces = processor.annotate_many(&subjects).unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].subject(), subjects[0]);
        assert_eq!(traces[0].column(IntervalFeature::Feeding).unwrap(), &[true, false]);
        assert_eq!(
            traces[1].column(IntervalFeature::Feeding).unwrap(),
            &[false, true, false]
        );
        assert_eq!(processor.cached_tables(), 1);

        let sequential = MovementProcessor::new(memory_source(), vec![IntervalFeature::Feeding])
            .with_parallel(false)
            .annotate_many(&subjects)
            .unwrap();
        assert_eq!(sequential, traces);
    }

    #[test]
    fn test_processor_failures() {
        let mut processor =
            MovementProcessor::new(memory_source(), vec![IntervalFeature::Feeding]);
        assert!(matches!(
            processor.annotate_many(&[SubjectDay::new(0, 0, 5), SubjectDay::new(7, 7, 7)]),
            Err(DataError::MissingMovementData(_))
        ));
        assert!(matches!(
            processor.annotate((-3i64, 0i64, 0i64)),
            Err(DataError::InvalidSubjectKey(_))
        ));

        let mut missing = MovementProcessor::new(memory_source(), vec![IntervalFeature::Water]);
        assert!(matches!(
            missing.annotate(SubjectDay::new(0, 0, 5)),
            Err(DataError::MissingIntervalData(_))
        ));
        assert_eq!(missing.cached_tables(), 0);
    }

    #[test]
    fn test_processor_from_config() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            features: vec![IntervalFeature::ActiveState, IntervalFeature::MoveActiveState],
            parallel: false,
        };

        let mut processor = MovementProcessor::from_config(&config);
        let annotated = processor.annotate((1i64, 1i64, 1i64)).unwrap();
        assert_eq!(annotated.columns(), vec!["t", "x", "y", "isHB", "AS", "M_AS"]);
        assert_eq!(processor.cached_tables(), 2);

        processor.clear_cache();
        assert_eq!(processor.cached_tables(), 0);
    }
}
