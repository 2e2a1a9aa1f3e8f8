//! Model Registry
//!
//! Every demo model implements [`DemoModel`], which is all the CLI needs to
//! run, sweep, or serve it. [`ModelKind`] names the models on the command
//! line and dispatches to the generic helpers.

use std::path::Path;
use std::time::Instant;

use abm_core::abm_types::{Params, UserParam};
use abm_core::{
    write_json, BatchResults, BatchRunner, DataCollector, FromParams, OutputError,
    SimError, SweepConfig, Table, TableWriter,
};
use abm_viz::{Elements, ModularServer, ServerConfig, ServerError};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{FlockModel, LifeModel, SchellingModel, VirusModel, WealthModel};

/// A model the `abm` tool knows how to run, sweep and serve.
pub trait DemoModel: FromParams + Send + 'static {
    /// Name used on the command line.
    const NAME: &'static str;
    /// Page title in the browser.
    const TITLE: &'static str;

    fn collector(&self) -> &DataCollector<Self>;

    /// Controls shown by the visualization server.
    fn user_params() -> Vec<UserParam>;

    fn elements() -> Elements<Self>;

    /// Batch runner with this model's reporters attached.
    fn batch_runner() -> BatchRunner<Self>;
}

/// Result of a single `abm run`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub model: &'static str,
    pub seed: u64,
    pub steps: u64,
    /// The model stopped on its own before the step limit.
    pub finished: bool,
    pub agents: usize,
    /// Last collected value of each model reporter.
    pub latest: Vec<(String, Value)>,
    pub model_vars: Table,
    pub agent_vars: Table,
}

/// Builds `M` over its defaults and runs it for at most `steps` steps.
pub fn run_demo<M: DemoModel>(
    params: &Params,
    seed: Option<u64>,
    steps: u64,
) -> Result<RunSummary, SimError> {
    let mut merged = M::default_params();
    for name in params.names() {
        if !merged.contains(name) {
            warn!(model = M::NAME, param = %name, "Unknown parameter");
        }
    }
    merged.merge(params);

    let mut model = M::from_params(&merged, seed)?;
    let seed = model.core().seed();
    info!(model = M::NAME, seed, max_steps = steps, "Starting run");

    let started = Instant::now();
    let taken = model.run_for(steps)?;
    info!(
        model = M::NAME,
        steps = taken,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run complete"
    );

    let collector = model.collector();
    let latest = collector
        .model_reporter_names()
        .map(|name| {
            let value = collector.latest(name).cloned().unwrap_or(Value::Null);
            (name.to_string(), value)
        })
        .collect();

    Ok(RunSummary {
        model: M::NAME,
        seed,
        steps: taken,
        finished: !model.running(),
        agents: model.schedule().len(),
        latest,
        model_vars: collector.model_vars_table(),
        agent_vars: collector.agent_vars_table(),
    })
}

/// Runs the sweep described by `config` with `M`'s reporters.
pub fn batch_demo<M: DemoModel>(
    config: &SweepConfig,
    sequential: bool,
) -> Result<BatchResults, SimError> {
    M::batch_runner()
        .with_config(config)
        .sequential(sequential)
        .run_all()
}

/// Visualization server for `M` with its elements and controls.
pub fn demo_server<M: DemoModel>(config: ServerConfig) -> ModularServer<M> {
    ModularServer::for_model(M::TITLE, M::elements())
        .user_params(M::user_params())
        .config(config)
}

/// Writes `model_vars.json` and `agent_vars.jsonl` into `dir`.
pub fn write_run(summary: &RunSummary, dir: &Path) -> Result<(), OutputError> {
    let records: Vec<_> = summary.model_vars.records().collect();
    write_json(dir.join("model_vars.json"), &records)?;

    let mut writer = TableWriter::create(dir.join("agent_vars.jsonl"))?;
    writer.write_table(&summary.agent_vars)?;
    writer.flush()
}

/// Writes `batch_model_vars.json` and `batch_agent_vars.jsonl` into `dir`.
pub fn write_batch(results: &BatchResults, dir: &Path) -> Result<(), OutputError> {
    let records: Vec<_> = results.model_vars_table().records().collect();
    write_json(dir.join("batch_model_vars.json"), &records)?;

    let mut writer = TableWriter::create(dir.join("batch_agent_vars.jsonl"))?;
    writer.write_table(&results.agent_vars_table())?;
    writer.flush()
}

/// The demo models, as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    Wealth,
    Schelling,
    Life,
    Virus,
    Flockers,
}

macro_rules! dispatch {
    ($kind:expr, $model:ident => $body:expr) => {
        match $kind {
            ModelKind::Wealth => {
                type $model = WealthModel;
                $body
            }
            ModelKind::Schelling => {
                type $model = SchellingModel;
                $body
            }
            ModelKind::Life => {
                type $model = LifeModel;
                $body
            }
            ModelKind::Virus => {
                type $model = VirusModel;
                $body
            }
            ModelKind::Flockers => {
                type $model = FlockModel;
                $body
            }
        }
    };
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Wealth,
        ModelKind::Schelling,
        ModelKind::Life,
        ModelKind::Virus,
        ModelKind::Flockers,
    ];

    pub fn name(self) -> &'static str {
        dispatch!(self, M => M::NAME)
    }

    pub fn title(self) -> &'static str {
        dispatch!(self, M => M::TITLE)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn default_params(self) -> Params {
        dispatch!(self, M => M::default_params())
    }

    pub fn run(self, params: &Params, seed: Option<u64>, steps: u64) -> Result<RunSummary, SimError> {
        dispatch!(self, M => run_demo::<M>(params, seed, steps))
    }

    pub fn batch(self, config: &SweepConfig, sequential: bool) -> Result<BatchResults, SimError> {
        dispatch!(self, M => batch_demo::<M>(config, sequential))
    }

    /// Serves the model until the process is stopped.
    pub async fn serve(self, config: ServerConfig) -> Result<(), ServerError> {
        dispatch!(self, M => demo_server::<M>(config).launch().await)
    }
}
