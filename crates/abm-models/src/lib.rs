//! Demo agent-based models and the glue the `abm` tool uses to run, sweep
//! and serve them.

pub mod models;
pub mod registry;

pub use registry::{
    batch_demo, demo_server, run_demo, write_batch, write_run, DemoModel, ModelKind, RunSummary,
};
