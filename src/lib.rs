//! Mousestyles - behavioral recordings of laboratory mice
//!
//! Loads pre-computed measurements (position traces, behavioral episodes and
//! per-bin summary features) from `.npy` arrays into typed tables, and marks
//! each observation of a movement trace with the episodes it falls inside.
//!
//! ## Modules
//!
//! - **Intervals**: open-interval membership over disjoint episodes
//! - **Annotator**: per-feature membership columns for a movement trace
//! - **Loader**: on-disk and in-memory recording sources

pub mod annotator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod intervals;
pub mod loader;
pub mod npy;
pub mod pipeline;
pub mod types;

pub use annotator::TrajectoryAnnotator;
pub use config::Config;
pub use error::DataError;
pub use intervals::{Interval, IntervalSet};
pub use loader::{DataStore, IntervalSource, MemoryStore, MovementSource};
pub use pipeline::{load_movement_and_all_intervals, load_movement_and_intervals, MovementProcessor};
pub use types::{AnnotatedTrace, IntervalFeature, IntervalTable, MovementTrace, SubjectDay};

/// Crate version embedded in summaries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for summaries
pub const PRODUCER_NAME: &str = "mousestyles";
