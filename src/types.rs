//! Core types for mousestyles
//!
//! This module defines the typed tables that flow between the loaders, the
//! interval engine and the encoders: subject-day keys, interval tables,
//! movement traces and annotated traces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;
use crate::intervals::Interval;

/// Behavioral episode categories recorded as interval files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntervalFeature {
    /// Active state
    #[serde(rename = "AS")]
    ActiveState,
    /// Feeding
    #[serde(rename = "F")]
    Feeding,
    /// Inactive state
    #[serde(rename = "IS")]
    InactiveState,
    /// Movement within an active state
    #[serde(rename = "M_AS")]
    MoveActiveState,
    /// Movement within an inactive state
    #[serde(rename = "M_IS")]
    MoveInactiveState,
    /// Drinking
    #[serde(rename = "W")]
    Water,
}

impl IntervalFeature {
    /// Every recognized feature, in canonical order
    pub const ALL: [IntervalFeature; 6] = [
        IntervalFeature::ActiveState,
        IntervalFeature::Feeding,
        IntervalFeature::InactiveState,
        IntervalFeature::MoveActiveState,
        IntervalFeature::MoveInactiveState,
        IntervalFeature::Water,
    ];

    /// Short code used for directory names and column headers
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalFeature::ActiveState => "AS",
            IntervalFeature::Feeding => "F",
            IntervalFeature::InactiveState => "IS",
            IntervalFeature::MoveActiveState => "M_AS",
            IntervalFeature::MoveInactiveState => "M_IS",
            IntervalFeature::Water => "W",
        }
    }

    /// Comma separated list of recognized codes, for error messages
    pub fn recognized() -> String {
        Self::ALL
            .iter()
            .map(|f| format!("\"{}\"", f.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse a list of feature names, failing on the first unknown one
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<IntervalFeature>, DataError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for IntervalFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalFeature {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DataError::InvalidFeature {
                name: s.to_string(),
                recognized: Self::recognized(),
            })
    }
}

/// Identifying key for one mouse's one day of recorded data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectDay {
    pub strain: u32,
    pub mouse: u32,
    pub day: u32,
}

impl SubjectDay {
    pub fn new(strain: u32, mouse: u32, day: u32) -> Self {
        Self { strain, mouse, day }
    }

    /// Recover the key from a `..strain{S}_mouse{M}_day{D}.npy` file name
    pub fn from_file_name(name: &str) -> Result<Self, DataError> {
        let invalid = || DataError::InvalidFilename(name.to_string());

        let stem = name.strip_suffix(".npy").ok_or_else(invalid)?;
        let (_, rest) = stem.split_once("strain").ok_or_else(invalid)?;
        let (strain, rest) = rest.split_once("_mouse").ok_or_else(invalid)?;
        let (mouse, day) = rest.split_once("_day").ok_or_else(invalid)?;

        let parse = |s: &str| {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            s.parse::<u32>().map_err(|_| invalid())
        };

        Ok(Self::new(parse(strain)?, parse(mouse)?, parse(day)?))
    }

    /// File name suffix shared by every per-subject array
    pub fn file_suffix(&self) -> String {
        format!("strain{}_mouse{}_day{}.npy", self.strain, self.mouse, self.day)
    }
}

impl fmt::Display for SubjectDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strain {} mouse {} day {}", self.strain, self.mouse, self.day)
    }
}

/// Conversion of caller-supplied key components into a validated [`SubjectDay`]
pub trait IntoSubjectDay {
    fn into_subject_day(self) -> Result<SubjectDay, DataError>;
}

impl IntoSubjectDay for SubjectDay {
    fn into_subject_day(self) -> Result<SubjectDay, DataError> {
        Ok(self)
    }
}

impl IntoSubjectDay for (i64, i64, i64) {
    fn into_subject_day(self) -> Result<SubjectDay, DataError> {
        let (strain, mouse, day) = self;
        if strain < 0 || mouse < 0 || day < 0 {
            return Err(DataError::InvalidSubjectKey(format!(
                "({}, {}, {}): values need to be nonnegative",
                strain, mouse, day
            )));
        }
        let component = |v: i64| {
            u32::try_from(v).map_err(|_| {
                DataError::InvalidSubjectKey(format!("{} is out of range", v))
            })
        };
        Ok(SubjectDay::new(component(strain)?, component(mouse)?, component(day)?))
    }
}

impl IntoSubjectDay for (f64, f64, f64) {
    fn into_subject_day(self) -> Result<SubjectDay, DataError> {
        let (strain, mouse, day) = self;
        let values = [strain, mouse, day];
        if values.iter().any(|v| *v < 0.0) {
            return Err(DataError::InvalidSubjectKey(format!(
                "({}, {}, {}): values need to be nonnegative",
                strain, mouse, day
            )));
        }
        if values
            .iter()
            .any(|v| !v.is_finite() || v.fract() != 0.0 || *v > u32::MAX as f64)
        {
            return Err(DataError::InvalidSubjectKey(format!(
                "({}, {}, {}): values need to be integer",
                strain, mouse, day
            )));
        }
        Ok(SubjectDay::new(strain as u32, mouse as u32, day as u32))
    }
}

/// One row of an interval table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub strain: u32,
    pub mouse: u32,
    pub day: u32,
    pub start: f64,
    pub stop: f64,
}

impl IntervalRecord {
    pub fn new(subject: SubjectDay, start: f64, stop: f64) -> Self {
        Self {
            strain: subject.strain,
            mouse: subject.mouse,
            day: subject.day,
            start,
            stop,
        }
    }

    pub fn subject(&self) -> SubjectDay {
        SubjectDay::new(self.strain, self.mouse, self.day)
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.stop)
    }
}

/// All episodes of one feature across every subject-day
///
/// Rows are kept sorted by subject-day; within a subject-day they keep the
/// order in which they were supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalTable {
    feature: IntervalFeature,
    rows: Vec<IntervalRecord>,
}

impl IntervalTable {
    pub fn new(feature: IntervalFeature, mut rows: Vec<IntervalRecord>) -> Self {
        // sort_by_key is stable
        rows.sort_by_key(|r| r.subject());
        Self { feature, rows }
    }

    pub fn feature(&self) -> IntervalFeature {
        self.feature
    }

    pub fn rows(&self) -> &[IntervalRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows belonging to a single subject-day, in supplied order
    pub fn rows_for(&self, subject: SubjectDay) -> &[IntervalRecord] {
        let lo = self.rows.partition_point(|r| r.subject() < subject);
        let hi = self.rows.partition_point(|r| r.subject() <= subject);
        &self.rows[lo..hi]
    }

    /// Intervals belonging to a single subject-day, in supplied order
    pub fn intervals_for(&self, subject: SubjectDay) -> Vec<Interval> {
        self.rows_for(subject).iter().map(IntervalRecord::interval).collect()
    }

    /// Distinct subject-days present in the table, sorted
    pub fn subjects(&self) -> Vec<SubjectDay> {
        let mut subjects: Vec<SubjectDay> = self.rows.iter().map(|r| r.subject()).collect();
        subjects.dedup();
        subjects
    }
}

/// One observation of a movement trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementRow {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "isHB")]
    pub is_hb: bool,
}

/// Position trace of one subject-day, stored column-wise
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementTrace {
    t: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    is_hb: Vec<bool>,
}

impl MovementTrace {
    /// Column names, in table order
    pub const COLUMNS: [&'static str; 4] = ["t", "x", "y", "isHB"];

    pub fn new(t: Vec<f64>, x: Vec<f64>, y: Vec<f64>, is_hb: Vec<bool>) -> Result<Self, DataError> {
        let n = t.len();
        if x.len() != n || y.len() != n || is_hb.len() != n {
            return Err(DataError::ShapeMismatch(format!(
                "movement columns have lengths t={}, x={}, y={}, isHB={}",
                n,
                x.len(),
                y.len(),
                is_hb.len()
            )));
        }
        Ok(Self { t, x, y, is_hb })
    }

    pub fn from_rows(rows: &[MovementRow]) -> Self {
        Self {
            t: rows.iter().map(|r| r.t).collect(),
            x: rows.iter().map(|r| r.x).collect(),
            y: rows.iter().map(|r| r.y).collect(),
            is_hb: rows.iter().map(|r| r.is_hb).collect(),
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn xs(&self) -> &[f64] {
        &self.x
    }

    pub fn ys(&self) -> &[f64] {
        &self.y
    }

    pub fn home_base(&self) -> &[bool] {
        &self.is_hb
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn row(&self, i: usize) -> Option<MovementRow> {
        Some(MovementRow {
            t: *self.t.get(i)?,
            x: self.x[i],
            y: self.y[i],
            is_hb: self.is_hb[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = MovementRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}

/// Boolean membership column for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub feature: IntervalFeature,
    pub values: Vec<bool>,
}

/// Movement trace widened with one membership column per requested feature
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedTrace {
    subject: SubjectDay,
    movement: MovementTrace,
    features: Vec<FeatureColumn>,
}

impl AnnotatedTrace {
    /// Assemble an annotated trace; every column must match the trace length
    pub fn new(
        subject: SubjectDay,
        movement: MovementTrace,
        features: Vec<FeatureColumn>,
    ) -> Result<Self, DataError> {
        if let Some(bad) = features.iter().find(|c| c.values.len() != movement.len()) {
            return Err(DataError::ShapeMismatch(format!(
                "column {} has {} values for a trace of {} rows",
                bad.feature,
                bad.values.len(),
                movement.len()
            )));
        }
        Ok(Self {
            subject,
            movement,
            features,
        })
    }

    pub fn subject(&self) -> SubjectDay {
        self.subject
    }

    pub fn movement(&self) -> &MovementTrace {
        &self.movement
    }

    pub fn feature_columns(&self) -> &[FeatureColumn] {
        &self.features
    }

    /// Membership values of one feature, if it was requested
    pub fn column(&self, feature: IntervalFeature) -> Option<&[bool]> {
        self.features
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.values.as_slice())
    }

    /// Column names: movement columns first, then features in request order
    pub fn columns(&self) -> Vec<String> {
        MovementTrace::COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.features.iter().map(|c| c.feature.as_str().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.movement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movement.is_empty()
    }

    pub fn into_movement(self) -> MovementTrace {
        self.movement
    }
}
