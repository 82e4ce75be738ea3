//! Per-bin summary features
//!
//! The summary file is a cube of `[feature] x [mouse-day] x [label + bins]`,
//! where the first three label columns are strain, mouse and day and the
//! remaining columns are consecutive 2-hour bins. This module reshapes it
//! into a tidy table with one row per `(strain, mouse, day, hour)`.

use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::npy::NpyArray;
use crate::types::{IntoSubjectDay, SubjectDay};

/// Value columns of the summary table, in cube order
pub const SUMMARY_FEATURES: [&str; 9] = [
    "ASProbability",
    "ASNumbers",
    "ASDurations",
    "Food",
    "Water",
    "Distance",
    "ASFoodIntensity",
    "ASWaterIntensity",
    "MoveASIntensity",
];

const LABEL_COLUMNS: usize = 3;
const BIN_HOURS: u32 = 2;

/// One mouse-day's 2-hour bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub strain: u32,
    pub mouse: u32,
    pub day: u32,
    /// First hour of the bin (0, 2, .., 20)
    pub hour: u32,
    #[serde(rename = "ASProbability")]
    pub as_probability: f64,
    #[serde(rename = "ASNumbers")]
    pub as_numbers: f64,
    #[serde(rename = "ASDurations")]
    pub as_durations: f64,
    #[serde(rename = "Food")]
    pub food: f64,
    #[serde(rename = "Water")]
    pub water: f64,
    #[serde(rename = "Distance")]
    pub distance: f64,
    #[serde(rename = "ASFoodIntensity")]
    pub as_food_intensity: f64,
    #[serde(rename = "ASWaterIntensity")]
    pub as_water_intensity: f64,
    #[serde(rename = "MoveASIntensity")]
    pub move_as_intensity: f64,
}

impl FeatureRow {
    fn from_values(subject: SubjectDay, hour: u32, v: [f64; 9]) -> Self {
        Self {
            strain: subject.strain,
            mouse: subject.mouse,
            day: subject.day,
            hour,
            as_probability: v[0],
            as_numbers: v[1],
            as_durations: v[2],
            food: v[3],
            water: v[4],
            distance: v[5],
            as_food_intensity: v[6],
            as_water_intensity: v[7],
            move_as_intensity: v[8],
        }
    }

    pub fn subject(&self) -> SubjectDay {
        SubjectDay::new(self.strain, self.mouse, self.day)
    }

    /// Feature values in [`SUMMARY_FEATURES`] order
    pub fn values(&self) -> [f64; 9] {
        [
            self.as_probability,
            self.as_numbers,
            self.as_durations,
            self.food,
            self.water,
            self.distance,
            self.as_food_intensity,
            self.as_water_intensity,
            self.move_as_intensity,
        ]
    }
}

/// Tidy summary-feature table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Melt a `9 x N x (3 + bins)` cube.
    ///
    /// Rows come out bin-major: every mouse-day for hour 0, then for hour 2,
    /// and so on. Labels are read from the first feature's slice.
    pub fn from_cube(cube: &NpyArray) -> Result<Self, DataError> {
        let (n_features, n_days, width) = match cube.shape() {
            [f, n, w] => (*f, *n, *w),
            other => {
                return Err(DataError::ShapeMismatch(format!(
                    "summary cube must be 3-d, found shape {:?}",
                    other
                )))
            }
        };
        if n_features != SUMMARY_FEATURES.len() || width <= LABEL_COLUMNS {
            return Err(DataError::ShapeMismatch(format!(
                "summary cube must be {} x N x (3 + bins), found {} x {} x {}",
                SUMMARY_FEATURES.len(),
                n_features,
                n_days,
                width
            )));
        }

        let values = cube.values();
        let at = |f: usize, m: usize, c: usize| values[(f * n_days + m) * width + c];

        let subjects = (0..n_days)
            .map(|m| (at(0, m, 0), at(0, m, 1), at(0, m, 2)).into_subject_day())
            .collect::<Result<Vec<_>, _>>()?;

        let n_bins = width - LABEL_COLUMNS;
        let mut rows = Vec::with_capacity(n_bins * n_days);
        for bin in 0..n_bins {
            let hour = bin as u32 * BIN_HOURS;
            for (m, subject) in subjects.iter().enumerate() {
                let mut v = [0.0; 9];
                for (f, slot) in v.iter_mut().enumerate() {
                    *slot = at(f, m, LABEL_COLUMNS + bin);
                }
                rows.push(FeatureRow::from_values(*subject, hour, v));
            }
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, labels first
    pub fn columns() -> Vec<&'static str> {
        ["strain", "mouse", "day", "hour"]
            .into_iter()
            .chain(SUMMARY_FEATURES)
            .collect()
    }

    /// Bins of one mouse-day, in hour order
    pub fn for_subject(&self, subject: SubjectDay) -> Vec<&FeatureRow> {
        let mut rows: Vec<&FeatureRow> =
            self.rows.iter().filter(|r| r.subject() == subject).collect();
        rows.sort_by_key(|r| r.hour);
        rows
    }

    /// All values of one summary feature, in row order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = SUMMARY_FEATURES.iter().position(|f| *f == name)?;
        Some(self.rows.iter().map(|r| r.values()[idx]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npy::{read_npy, write_npy_f64};
    use pretty_assertions::assert_eq;

    /// 9 features x 2 mouse-days x (3 labels + 2 bins); value = 100 f + 10 m + bin
    fn make_cube() -> NpyArray {
        let labels = [[0.0, 1.0, 5.0], [3.0, 2.0, 6.0]];
        let mut values = Vec::new();
        for f in 0..9 {
            for (m, label) in labels.iter().enumerate() {
                values.extend_from_slice(label);
                for bin in 0..2 {
                    values.push((100 * f + 10 * m + bin) as f64);
                }
            }
        }
        let mut buf = Vec::new();
        write_npy_f64(&mut buf, &[9, 2, 5], &values).unwrap();
        read_npy(buf.as_slice()).unwrap()
    }

    #[test]
    fn test_melt_is_bin_major() {
        let table = FeatureTable::from_cube(&make_cube()).unwrap();
        assert_eq!(table.len(), 4);

        let keys: Vec<(u32, u32, u32, u32)> = table
            .rows()
            .iter()
            .map(|r| (r.strain, r.mouse, r.day, r.hour))
            .collect();
        assert_eq!(keys, vec![(0, 1, 5, 0), (3, 2, 6, 0), (0, 1, 5, 2), (3, 2, 6, 2)]);

        let row = &table.rows()[3];
        assert_eq!(row.as_probability, 11.0);
        assert_eq!(row.food, 311.0);
        assert_eq!(row.move_as_intensity, 811.0);
    }

    #[test]
    fn test_column_and_subject_lookup() {
        let table = FeatureTable::from_cube(&make_cube()).unwrap();
        assert_eq!(table.column("Water"), Some(vec![400.0, 410.0, 401.0, 411.0]));
        assert_eq!(table.column("Nope"), None);

        let bins = table.for_subject(SubjectDay::new(3, 2, 6));
        assert_eq!(bins.iter().map(|r| r.hour).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(FeatureTable::columns().len(), 13);
    }

    #[test]
    fn test_serializes_with_original_column_names() {
        let table = FeatureTable::from_cube(&make_cube()).unwrap();
        let json = serde_json::to_value(&table.rows()[0]).unwrap();
        assert_eq!(json["ASProbability"], 0.0);
        assert_eq!(json["MoveASIntensity"], 800.0);
        assert_eq!(json["hour"], 0);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let mut buf = Vec::new();
        write_npy_f64(&mut buf, &[2, 1, 5], &[0.0; 10]).unwrap();
        let cube = read_npy(buf.as_slice()).unwrap();
        assert!(matches!(
            FeatureTable::from_cube(&cube),
            Err(DataError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_fractional_labels() {
        let mut values = vec![0.0; 9 * 4];
        values[0] = 0.5;
        let mut buf = Vec::new();
        write_npy_f64(&mut buf, &[9, 1, 4], &values).unwrap();
        let cube = read_npy(buf.as_slice()).unwrap();
        assert!(matches!(
            FeatureTable::from_cube(&cube),
            Err(DataError::InvalidSubjectKey(_))
        ));
    }
}
