//! Trajectory annotation
//!
//! Widens a movement trace with one boolean column per requested interval
//! feature. Each column is the membership of the trace's timestamps in that
//! feature's episodes for the trace's own subject-day.

use log::debug;
use rayon::prelude::*;

use crate::error::DataError;
use crate::intervals::IntervalSet;
use crate::loader::IntervalSource;
use crate::types::{
    AnnotatedTrace, FeatureColumn, IntervalFeature, IntervalTable, MovementTrace, SubjectDay,
};

/// Attaches interval-membership columns to movement traces
pub struct TrajectoryAnnotator<'a, S: IntervalSource + ?Sized> {
    source: &'a S,
    parallel: bool,
}

impl<'a, S: IntervalSource + ?Sized> TrajectoryAnnotator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            parallel: true,
        }
    }

    /// Compute feature columns on the rayon pool, or one after another
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Annotate a trace with features given by name.
    ///
    /// Every name is checked before any table is loaded, so an unknown name
    /// fails with `InvalidFeature` and nothing else happens.
    pub fn annotate<N: AsRef<str>>(
        &self,
        subject: SubjectDay,
        trace: &MovementTrace,
        features: &[N],
    ) -> Result<AnnotatedTrace, DataError> {
        let features = IntervalFeature::parse_list(features)?;
        self.annotate_features(subject, trace, &features)
    }

    /// Annotate a trace with already-parsed features.
    ///
    /// Columns follow request order; a feature requested twice yields a single
    /// column at its first position. An empty request returns the trace
    /// unchanged.
    pub fn annotate_features(
        &self,
        subject: SubjectDay,
        trace: &MovementTrace,
        features: &[IntervalFeature],
    ) -> Result<AnnotatedTrace, DataError> {
        let mut requested: Vec<IntervalFeature> = Vec::with_capacity(features.len());
        for &feature in features {
            if !requested.contains(&feature) {
                requested.push(feature);
            }
        }

        let compute = |feature: &IntervalFeature| -> Result<FeatureColumn, DataError> {
            let table = self.source.intervals(*feature)?;
            membership_column(&table, subject, trace.times())
        };

        let columns = if self.parallel && requested.len() > 1 {
            requested
                .par_iter()
                .map(compute)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            requested
                .iter()
                .map(compute)
                .collect::<Result<Vec<_>, _>>()?
        };

        AnnotatedTrace::new(subject, trace.clone(), columns)
    }
}

/// Membership of `times` in one subject-day's episodes of a feature table.
///
/// # Errors
/// `MissingIntervalData` if the table is empty for every subject-day,
/// `InvalidInterval` if this subject-day's episodes are malformed. A table
/// with no rows for this subject-day gives an all-false column.
pub fn membership_column(
    table: &IntervalTable,
    subject: SubjectDay,
    times: &[f64],
) -> Result<FeatureColumn, DataError> {
    if table.is_empty() {
        return Err(DataError::MissingIntervalData(table.feature().to_string()));
    }

    let set = IntervalSet::new(table.intervals_for(subject)).map_err(|e| match e {
        DataError::InvalidInterval(msg) => DataError::InvalidInterval(format!(
            "{} episodes of {}: {}",
            table.feature(),
            subject,
            msg
        )),
        other => other,
    })?;

    debug!(
        "{}: {} episodes for {} against {} timestamps",
        table.feature(),
        set.len(),
        subject,
        times.len()
    );

    Ok(FeatureColumn {
        feature: table.feature(),
        values: set.contains_all(times),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryStore;
    use crate::types::IntervalRecord;
    use pretty_assertions::assert_eq;

    fn subject() -> SubjectDay {
        SubjectDay::new(1, 1, 1)
    }

    fn other() -> SubjectDay {
        SubjectDay::new(1, 2, 1)
    }

    fn trace() -> MovementTrace {
        MovementTrace::new(
            vec![56448.333, 56448.653, 56449.273],
            vec![-6.289, -5.509, -5.048],
            vec![34.902, 34.173, 33.284],
            vec![false, true, true],
        )
        .unwrap()
    }

    fn table(feature: IntervalFeature, rows: &[(SubjectDay, f64, f64)]) -> IntervalTable {
        IntervalTable::new(
            feature,
            rows.iter()
                .map(|(s, a, b)| IntervalRecord::new(*s, *a, *b))
                .collect(),
        )
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_intervals(table(
                IntervalFeature::ActiveState,
                &[(subject(), 56448.5, 56450.0), (other(), 0.0, 1e9)],
            ))
            .with_intervals(table(
                IntervalFeature::Feeding,
                &[(subject(), 56448.0, 56448.4), (subject(), 56449.0, 56449.273)],
            ))
            .with_intervals(table(IntervalFeature::Water, &[(other(), 0.0, 1e9)]))
    }

    #[test]
    fn test_active_state_scenario() {
        let store = store();
        let annotated = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &trace(), &["AS"])
            .unwrap();

        assert_eq!(
            annotated.column(IntervalFeature::ActiveState).unwrap(),
            &[false, true, true]
        );
    }

    #[test]
    fn test_no_features_is_identity() {
        let store = MemoryStore::new();
        let input = trace();
        let annotated = TrajectoryAnnotator::new(&store)
            .annotate::<&str>(subject(), &input, &[])
            .unwrap();

        assert_eq!(annotated.movement(), &input);
        assert!(annotated.feature_columns().is_empty());
        assert_eq!(annotated.columns(), vec!["t", "x", "y", "isHB"]);
    }

    #[test]
    fn test_columns_append_in_request_order() {
        let store = store();
        let input = trace();
        let annotated = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &input, &["W", "AS", "F"])
            .unwrap();

        assert_eq!(
            annotated.columns(),
            vec!["t", "x", "y", "isHB", "W", "AS", "F"]
        );
        assert_eq!(annotated.len(), input.len());
        assert_eq!(annotated.movement(), &input);
        // only other subject-days have drinking episodes
        assert_eq!(
            annotated.column(IntervalFeature::Water).unwrap(),
            &[false, false, false]
        );
        // 56449.273 sits on a stop boundary
        assert_eq!(
            annotated.column(IntervalFeature::Feeding).unwrap(),
            &[true, false, false]
        );
    }

    #[test]
    fn test_single_feature_adds_one_column() {
        let store = store();
        let input = trace();
        let annotated = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &input, &["AS"])
            .unwrap();

        let mut expected: Vec<String> = MovementTrace::COLUMNS.iter().map(|c| c.to_string()).collect();
        expected.push("AS".to_string());
        assert_eq!(annotated.columns(), expected);
        assert_eq!(annotated.len(), 3);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let store = store();
        let input = trace();
        let names = ["F", "AS", "W"];
        let parallel = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &input, &names)
            .unwrap();
        let sequential = TrajectoryAnnotator::new(&store)
            .with_parallel(false)
            .annotate(subject(), &input, &names)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_duplicate_request_yields_one_column() {
        let store = store();
        let annotated = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &trace(), &["AS", "F", "AS"])
            .unwrap();
        assert_eq!(annotated.columns(), vec!["t", "x", "y", "isHB", "AS", "F"]);
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let store = store();
        let err = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &trace(), &["AS", "XYZ"])
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidFeature { .. }));
    }

    #[test]
    fn test_missing_source_is_not_all_false() {
        let store = store();
        let err = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &trace(), &["AS", "IS"])
            .unwrap_err();
        assert!(matches!(err, DataError::MissingIntervalData(_)));
    }

    #[test]
    fn test_malformed_episodes_fail() {
        let store = MemoryStore::new().with_intervals(table(
            IntervalFeature::ActiveState,
            &[(subject(), 10.0, 20.0), (subject(), 15.0, 25.0)],
        ));
        let err = TrajectoryAnnotator::new(&store)
            .annotate(subject(), &trace(), &["AS"])
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidInterval(_)));
        assert!(err.to_string().contains("strain 1 mouse 1 day 1"));
    }

    #[test]
    fn test_membership_column_empty_table() {
        let empty = IntervalTable::new(IntervalFeature::Feeding, Vec::new());
        assert!(matches!(
            membership_column(&empty, subject(), &[1.0]),
            Err(DataError::MissingIntervalData(_))
        ));
    }
}
