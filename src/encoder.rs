//! Trace encoding
//!
//! This module renders annotated traces as NDJSON, JSON or CSV, and condenses
//! them into an [`AnnotationSummary`]. Row objects keep table column order.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DataError;
use crate::types::{AnnotatedTrace, IntervalFeature, SubjectDay};
use crate::{PRODUCER_NAME, VERSION};

/// Output layout of an encoded trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One row object per line
    Ndjson,
    /// JSON array of row objects
    Json,
    /// Pretty-printed JSON array
    JsonPretty,
    /// Comma separated values with a header line
    Csv,
}

/// One row of an annotated trace, serialized as an ordered map
struct RowView<'a> {
    trace: &'a AnnotatedTrace,
    index: usize,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let movement = self.trace.movement();
        let i = self.index;
        let columns = self.trace.feature_columns();

        let mut map = serializer.serialize_map(Some(4 + columns.len()))?;
        map.serialize_entry("t", &movement.times()[i])?;
        map.serialize_entry("x", &movement.xs()[i])?;
        map.serialize_entry("y", &movement.ys()[i])?;
        map.serialize_entry("isHB", &movement.home_base()[i])?;
        for column in columns {
            map.serialize_entry(column.feature.as_str(), &column.values[i])?;
        }
        map.end()
    }
}

struct RowsView<'a>(&'a AnnotatedTrace);

impl Serialize for RowsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for index in 0..self.0.len() {
            seq.serialize_element(&RowView {
                trace: self.0,
                index,
            })?;
        }
        seq.end()
    }
}

/// Encoder for annotated traces
pub struct TraceEncoder;

impl TraceEncoder {
    /// Encode a trace in the requested layout
    pub fn encode(trace: &AnnotatedTrace, format: OutputFormat) -> Result<String, DataError> {
        match format {
            OutputFormat::Ndjson => Self::to_ndjson(trace),
            OutputFormat::Json => Ok(serde_json::to_string(&RowsView(trace))?),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&RowsView(trace))?),
            OutputFormat::Csv => Ok(Self::to_csv(trace)),
        }
    }

    fn to_ndjson(trace: &AnnotatedTrace) -> Result<String, DataError> {
        let mut out = String::new();
        for index in 0..trace.len() {
            out.push_str(&serde_json::to_string(&RowView { trace, index })?);
            out.push('\n');
        }
        Ok(out)
    }

    fn to_csv(trace: &AnnotatedTrace) -> String {
        let movement = trace.movement();
        let mut out = trace.columns().join(",");
        out.push('\n');

        for i in 0..trace.len() {
            out.push_str(&format!(
                "{},{},{},{}",
                movement.times()[i],
                movement.xs()[i],
                movement.ys()[i],
                movement.home_base()[i]
            ));
            for column in trace.feature_columns() {
                out.push_str(&format!(",{}", column.values[i]));
            }
            out.push('\n');
        }
        out
    }
}

/// Per-feature occupancy within one annotated trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature: IntervalFeature,
    /// Timestamps inside an episode
    pub contained: usize,
    /// `contained / rows`, 0 for an empty trace
    pub fraction: f64,
    /// Runs of consecutive contained timestamps
    pub runs: usize,
}

/// Overview of an annotated trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub producer: String,
    pub version: String,
    pub subject: SubjectDay,
    pub rows: usize,
    pub first_t: Option<f64>,
    pub last_t: Option<f64>,
    pub home_base_fraction: f64,
    pub features: Vec<FeatureSummary>,
    pub computed_at_utc: DateTime<Utc>,
}

impl AnnotationSummary {
    pub fn from_trace(trace: &AnnotatedTrace) -> Self {
        let rows = trace.len();
        let fraction = |count: usize| {
            if rows == 0 {
                0.0
            } else {
                count as f64 / rows as f64
            }
        };

        let movement = trace.movement();
        let home = movement.home_base().iter().filter(|b| **b).count();

        let features = trace
            .feature_columns()
            .iter()
            .map(|column| {
                let contained = column.values.iter().filter(|b| **b).count();
                let runs = column
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(i, v)| **v && (*i == 0 || !column.values[i - 1]))
                    .count();
                FeatureSummary {
                    feature: column.feature,
                    contained,
                    fraction: fraction(contained),
                    runs,
                }
            })
            .collect();

        Self {
            producer: PRODUCER_NAME.to_string(),
            version: VERSION.to_string(),
            subject: trace.subject(),
            rows,
            first_t: movement.times().first().copied(),
            last_t: movement.times().last().copied(),
            home_base_fraction: fraction(home),
            features,
            computed_at_utc: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
