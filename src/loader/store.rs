//! On-disk recordings
//!
//! Reads the `.npy` directory layout of the data set:
//!
//! ```text
//! <root>/intervals/<FEATURE>/..strain{S}_mouse{M}_day{D}.npy   n x 2 (start, stop)
//! <root>/txy_coords/CT/CT_strain{S}_mouse{M}_day{D}.npy        t
//! <root>/txy_coords/CX/CX_strain{S}_mouse{M}_day{D}.npy        x
//! <root>/txy_coords/CY/CY_strain{S}_mouse{M}_day{D}.npy        y
//! <root>/txy_coords/C_idx_HB/C_idx_HB_strain{S}_mouse{M}_day{D}.npy   not in home base
//! <root>/all_features_mousedays_11bins.npy                     9 x N x 14
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::DataError;
use crate::features::FeatureTable;
use crate::npy::read_npy_file;
use crate::types::{
    IntervalFeature, IntervalRecord, IntervalTable, IntoSubjectDay, MovementTrace, SubjectDay,
};

use super::{IntervalSource, MovementSource};

/// Name of the summary-feature cube under the data directory
pub const SUMMARY_FILE: &str = "all_features_mousedays_11bins.npy";

const INTERVALS_DIR: &str = "intervals";
const COORDS_DIR: &str = "txy_coords";

/// Recordings rooted at a data directory
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the interval files of one feature
    pub fn intervals_dir(&self, feature: IntervalFeature) -> PathBuf {
        self.root.join(INTERVALS_DIR).join(feature.as_str())
    }

    /// Path of one movement component (`CT`, `CX`, `CY` or `C_idx_HB`)
    pub fn movement_path(&self, component: &str, subject: SubjectDay) -> PathBuf {
        self.root
            .join(COORDS_DIR)
            .join(component)
            .join(format!("{}_{}", component, subject.file_suffix()))
    }

    /// Load every episode of a feature given by name.
    ///
    /// # Errors
    /// `InvalidFeature` for an unknown name, `MissingIntervalData` when the
    /// feature directory is absent or holds no array files.
    pub fn load_intervals(&self, name: &str) -> Result<IntervalTable, DataError> {
        let feature: IntervalFeature = name.parse()?;
        self.read_intervals(feature)
    }

    /// Load the movement trace of one subject-day.
    ///
    /// # Errors
    /// `InvalidSubjectKey` for negative or non-integer keys, checked before
    /// touching the file system.
    pub fn load_movement<K: IntoSubjectDay>(&self, key: K) -> Result<MovementTrace, DataError> {
        let subject = key.into_subject_day()?;
        self.read_movement(subject)
    }

    /// Load the tidy per-bin summary-feature table
    pub fn load_all_features(&self) -> Result<FeatureTable, DataError> {
        let path = self.root.join(SUMMARY_FILE);
        let cube = read_npy_file(&path)?;
        let table = FeatureTable::from_cube(&cube)?;
        info!("loaded {} summary rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// Every subject-day with a recorded time column, sorted
    pub fn subject_days(&self) -> Result<Vec<SubjectDay>, DataError> {
        let dir = self.root.join(COORDS_DIR).join("CT");
        let mut subjects = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            match SubjectDay::from_file_name(&name) {
                Ok(subject) => subjects.push(subject),
                Err(_) => warn!("skipping {} in {}", name, dir.display()),
            }
        }
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    fn read_intervals(&self, feature: IntervalFeature) -> Result<IntervalTable, DataError> {
        let dir = self.intervals_dir(feature);
        let missing = || {
            DataError::MissingIntervalData(format!("{} (no files in {})", feature, dir.display()))
        };

        if !dir.is_dir() {
            return Err(missing());
        }

        let mut names: Vec<String> = fs::read_dir(&dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<_, _>>()?;
        names.sort();

        let mut rows = Vec::new();
        let mut files = 0usize;
        for name in names {
            if !name.ends_with(".npy") {
                warn!("skipping non-array file {} in {}", name, dir.display());
                continue;
            }
            let subject = SubjectDay::from_file_name(&name)?;
            let array = read_npy_file(&dir.join(&name))?;

            let n = match array.shape() {
                [n, 2] => *n,
                [0] | [0, _] => 0,
                other => {
                    return Err(DataError::ShapeMismatch(format!(
                        "{}: expected n x 2 intervals, found shape {:?}",
                        name, other
                    )))
                }
            };

            let values = array.values();
            rows.extend(
                (0..n).map(|i| IntervalRecord::new(subject, values[2 * i], values[2 * i + 1])),
            );
            files += 1;
            debug!("{}: {} episodes for {}", feature, n, subject);
        }

        if files == 0 {
            return Err(missing());
        }

        info!("loaded {} {} episodes from {} files", rows.len(), feature, files);
        Ok(IntervalTable::new(feature, rows))
    }

    fn read_movement(&self, subject: SubjectDay) -> Result<MovementTrace, DataError> {
        let t_path = self.movement_path("CT", subject);
        if !t_path.is_file() {
            return Err(DataError::MissingMovementData(format!(
                "{} ({} not found)",
                subject,
                t_path.display()
            )));
        }

        let load = |component: &str| -> Result<_, DataError> {
            let array = read_npy_file(&self.movement_path(component, subject))?;
            array.expect_1d()?;
            Ok(array)
        };

        let t = load("CT")?.into_values();
        let x = load("CX")?.into_values();
        let y = load("CY")?.into_values();
        // the stored flags mark observations outside the home base
        let is_hb = load("C_idx_HB")?.to_bools().into_iter().map(|b| !b).collect();

        let trace = MovementTrace::new(t, x, y, is_hb)?;
        debug!("loaded {} movement rows for {}", trace.len(), subject);
        Ok(trace)
    }
}

impl IntervalSource for DataStore {
    fn intervals(&self, feature: IntervalFeature) -> Result<Arc<IntervalTable>, DataError> {
        self.read_intervals(feature).map(Arc::new)
    }
}

impl MovementSource for DataStore {
    fn movement(&self, subject: SubjectDay) -> Result<MovementTrace, DataError> {
        self.read_movement(subject)
    }
}
