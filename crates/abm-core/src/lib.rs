//! Core agent-based modeling framework: agents, models, schedules, spaces,
//! data collection and batch parameter sweeps.
//!
//! Execution is single-threaded and step-synchronous within a model. Batch
//! sweeps may run many models at once because each run owns its own model.

pub mod agent;
pub mod batchrunner;
pub mod config;
pub mod datacollection;
pub mod error;
pub mod model;
pub mod output;
pub mod parallel;
pub mod space;
pub mod time;

pub use agent::Agent;
pub use error::SimError;
pub use model::{FromParams, Model, ModelCore};

// Re-export scheduling types
pub use time::{activate, Activation, Schedule, ScheduleError, StagedActivation};

// Re-export spaces
pub use space::{
    ContinuousSpace, Graph, GridShape, MultiGrid, Neighborhood, NetworkGrid, SingleGrid,
    SpaceError, SpatialView,
};

// Re-export data collection and batch types
pub use batchrunner::{BatchResults, BatchRunner, RunRecord, RunSpec};
pub use config::{BatchSection, ConfigError, RunConfig, SweepConfig};
pub use datacollection::{CollectorError, DataCollector, Table};
pub use output::{write_json, OutputError, TableWriter};

// Shared data types used throughout the public API
pub use abm_types;
