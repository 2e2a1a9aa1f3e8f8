//! Batch Runner
//!
//! Runs a model over a grid of parameter combinations, several times each,
//! and reports model and agent variables at the end of every run.
//!
//! Runs are independent: each owns its model and RNG, so with the `parallel`
//! feature they execute on the rayon pool. Results always come back in run
//! order, and run `k` is seeded with `base_seed + k`, so parallel and
//! sequential sweeps give identical results.

use abm_types::{AgentId, ParamValue, Params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::config::SweepConfig;
use crate::datacollection::{AgentReporter, ModelReporter, Table};
use crate::error::SimError;
use crate::model::{FromParams, Model};
use crate::parallel;

/// Builds a model from parameters and a seed.
pub type ModelFactory<M> = Box<dyn Fn(&Params, u64) -> Result<M, SimError> + Send + Sync>;

/// One run of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub run_id: usize,
    pub iteration: usize,
    pub seed: u64,
    pub params: Params,
}

/// Final values of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentVars {
    pub agent_id: AgentId,
    pub values: BTreeMap<String, Value>,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: usize,
    pub iteration: usize,
    pub seed: u64,
    pub params: Params,
    /// Steps taken before the model stopped or hit the limit
    pub steps: u64,
    pub model_vars: BTreeMap<String, Value>,
    pub agent_vars: Vec<AgentVars>,
}

/// Every run of a sweep, in run order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    pub runs: Vec<RunRecord>,
    pub variable_names: Vec<String>,
    pub fixed_names: Vec<String>,
    pub model_reporters: Vec<String>,
    pub agent_reporters: Vec<String>,
}

impl BatchResults {
    /// One row per run: `run_id`, `iteration`, parameters, `steps`, then the
    /// model reporters.
    pub fn model_vars_table(&self) -> Table {
        let param_names: Vec<&String> = self
            .variable_names
            .iter()
            .chain(self.fixed_names.iter().filter(|n| !self.variable_names.contains(*n)))
            .collect();

        let columns = ["run_id", "iteration"]
            .into_iter()
            .map(String::from)
            .chain(param_names.iter().map(|n| n.to_string()))
            .chain(std::iter::once("steps".to_string()))
            .chain(self.model_reporters.iter().cloned());
        let mut table = Table::new(columns);

        for run in &self.runs {
            let mut row = vec![Value::from(run.run_id), Value::from(run.iteration)];
            row.extend(param_names.iter().map(|name| {
                run.params
                    .get(name.as_str())
                    .map(ParamValue::to_json)
                    .unwrap_or(Value::Null)
            }));
            row.push(Value::from(run.steps));
            row.extend(
                self.model_reporters
                    .iter()
                    .map(|name| run.model_vars.get(name).cloned().unwrap_or(Value::Null)),
            );
            table.push_row(row);
        }
        table
    }

    /// One row per agent per run: `run_id`, `agent_id`, then the agent
    /// reporters.
    pub fn agent_vars_table(&self) -> Table {
        let columns = ["run_id", "agent_id"]
            .into_iter()
            .map(String::from)
            .chain(self.agent_reporters.iter().cloned());
        let mut table = Table::new(columns);

        for run in &self.runs {
            for agent in &run.agent_vars {
                let mut row = vec![Value::from(run.run_id), Value::from(agent.agent_id.0)];
                row.extend(
                    self.agent_reporters
                        .iter()
                        .map(|name| agent.values.get(name).cloned().unwrap_or(Value::Null)),
                );
                table.push_row(row);
            }
        }
        table
    }
}

/// Parameter sweep over a model.
pub struct BatchRunner<M: Model> {
    factory: ModelFactory<M>,
    fixed: Params,
    variable: Vec<(String, Vec<ParamValue>)>,
    iterations: usize,
    max_steps: u64,
    base_seed: u64,
    model_reporters: Vec<(String, ModelReporter<M>)>,
    agent_reporters: Vec<(String, AgentReporter<M::Agent>)>,
    force_sequential: bool,
}

impl<M: Model> BatchRunner<M> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Params, u64) -> Result<M, SimError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            fixed: Params::new(),
            variable: Vec::new(),
            iterations: 1,
            max_steps: 1000,
            base_seed: 0,
            model_reporters: Vec::new(),
            agent_reporters: Vec::new(),
            force_sequential: false,
        }
    }

    /// Builds runs through [`FromParams`], layering sweep parameters over
    /// the model's defaults.
    pub fn from_model() -> Self
    where
        M: FromParams + 'static,
    {
        Self::new(|params: &Params, seed: u64| {
            let mut merged = M::default_params();
            merged.merge(params);
            M::from_params(&merged, Some(seed))
        })
    }

    pub fn fixed_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.fixed.set(name, value);
        self
    }

    /// Adds a swept parameter. Redeclaring a name replaces its values.
    pub fn variable_param<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let name = name.into();
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.variable.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = values,
            None => self.variable.push((name, values)),
        }
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn seed(mut self, base_seed: u64) -> Self {
        self.base_seed = base_seed;
        self
    }

    /// Forces runs onto the calling thread even when built with `parallel`.
    pub fn sequential(mut self, force: bool) -> Self {
        self.force_sequential = force;
        self
    }

    pub fn model_reporter<F>(mut self, name: impl Into<String>, reporter: F) -> Self
    where
        F: Fn(&M) -> Value + Send + Sync + 'static,
    {
        self.model_reporters.push((name.into(), Box::new(reporter)));
        self
    }

    pub fn agent_reporter<F>(mut self, name: impl Into<String>, reporter: F) -> Self
    where
        F: Fn(&M::Agent) -> Value + Send + Sync + 'static,
    {
        self.agent_reporters.push((name.into(), Box::new(reporter)));
        self
    }

    /// Applies a sweep file: batch settings, fixed and variable parameters.
    pub fn with_config(mut self, config: &SweepConfig) -> Self {
        self = self
            .iterations(config.batch.iterations)
            .max_steps(config.batch.max_steps)
            .seed(config.batch.seed);
        self.fixed.merge(&config.fixed);
        for (name, values) in &config.variable {
            self = self.variable_param(name.clone(), values.iter().cloned());
        }
        self
    }

    /// Expands the sweep into individual runs.
    ///
    /// Combinations follow declaration order with the last parameter varying
    /// fastest; each combination repeats `iterations` times.
    pub fn run_specs(&self) -> Result<Vec<RunSpec>, SimError> {
        if let Some((name, _)) = self.variable.iter().find(|(_, values)| values.is_empty()) {
            return Err(SimError::InvalidSweep(format!(
                "variable parameter '{}' has no values",
                name
            )));
        }

        let combinations: usize = self.variable.iter().map(|(_, v)| v.len()).product();
        let mut specs = Vec::with_capacity(combinations * self.iterations);
        let mut digits = vec![0usize; self.variable.len()];

        for _ in 0..combinations {
            let mut params = self.fixed.clone();
            for ((name, values), digit) in self.variable.iter().zip(&digits) {
                params.set(name.clone(), values[*digit].clone());
            }
            for iteration in 0..self.iterations {
                let run_id = specs.len();
                specs.push(RunSpec {
                    run_id,
                    iteration,
                    seed: self.base_seed.wrapping_add(run_id as u64),
                    params: params.clone(),
                });
            }

            // odometer: bump the last digit, carry leftwards
            for (position, (_, values)) in self.variable.iter().enumerate().rev() {
                digits[position] += 1;
                if digits[position] < values.len() {
                    break;
                }
                digits[position] = 0;
            }
        }
        Ok(specs)
    }

    /// Executes one run and reads the reporters off its final state.
    pub fn run_one(&self, spec: &RunSpec) -> Result<RunRecord, SimError> {
        debug!(run_id = spec.run_id, seed = spec.seed, "batch run starting");
        let mut model = (self.factory)(&spec.params, spec.seed)?;
        let steps = model.run_for(self.max_steps)?;

        let model_vars = self
            .model_reporters
            .iter()
            .map(|(name, reporter)| (name.clone(), reporter(&model)))
            .collect();

        let agent_vars = if self.agent_reporters.is_empty() {
            Vec::new()
        } else {
            model
                .schedule()
                .iter()
                .map(|agent| AgentVars {
                    agent_id: agent.unique_id(),
                    values: self
                        .agent_reporters
                        .iter()
                        .map(|(name, reporter)| (name.clone(), reporter(agent)))
                        .collect(),
                })
                .collect()
        };

        debug!(run_id = spec.run_id, steps, "batch run finished");
        Ok(RunRecord {
            run_id: spec.run_id,
            iteration: spec.iteration,
            seed: spec.seed,
            params: spec.params.clone(),
            steps,
            model_vars,
            agent_vars,
        })
    }

    /// Runs the whole sweep. The first failing run aborts it.
    pub fn run_all(&self) -> Result<BatchResults, SimError> {
        let specs = self.run_specs()?;
        let started = Instant::now();
        let sequential = self.force_sequential || !parallel::parallel_enabled();

        let outcomes = parallel::map_slice(&specs, |spec| self.run_one(spec), self.force_sequential);
        let runs = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;

        info!(
            runs = runs.len(),
            sequential,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch sweep complete"
        );

        Ok(BatchResults {
            runs,
            variable_names: self.variable.iter().map(|(name, _)| name.clone()).collect(),
            fixed_names: self.fixed.names().cloned().collect(),
            model_reporters: self.model_reporters.iter().map(|(n, _)| n.clone()).collect(),
            agent_reporters: self.agent_reporters.iter().map(|(n, _)| n.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelCore;
    use crate::time::{Activation, Schedule};
    use rand::Rng;
    use serde_json::json;

    struct Walker {
        id: AgentId,
        position: i64,
    }

    struct WalkModel {
        core: ModelCore,
        schedule: Schedule<Walker>,
        limit: i64,
    }

    impl Model for WalkModel {
        type Agent = Walker;

        fn core(&self) -> &ModelCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut ModelCore {
            &mut self.core
        }
        fn schedule(&self) -> &Schedule<Walker> {
            &self.schedule
        }
        fn schedule_mut(&mut self) -> &mut Schedule<Walker> {
            &mut self.schedule
        }

        fn step(&mut self) -> Result<(), SimError> {
            crate::time::activate(self)?;
            if self.schedule.iter().any(|w| w.position.abs() >= self.limit) {
                self.stop();
            }
            Ok(())
        }
    }

    impl Agent for Walker {
        type Model = WalkModel;

        fn unique_id(&self) -> AgentId {
            self.id
        }

        fn step(&mut self, model: &mut WalkModel) -> Result<(), SimError> {
            self.position += if model.rng().gen_bool(0.5) { 1 } else { -1 };
            Ok(())
        }
    }

    impl FromParams for WalkModel {
        fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError> {
            let mut model = WalkModel {
                core: ModelCore::new(seed),
                schedule: Schedule::new(Activation::Random),
                limit: params.get_i64("limit")?,
            };
            for _ in 0..params.get_usize("walkers")? {
                let id = model.next_id();
                model.schedule.add(Walker { id, position: 0 })?;
            }
            Ok(model)
        }

        fn default_params() -> Params {
            Params::new().with("walkers", 3i64).with("limit", 1000i64)
        }
    }

    fn runner() -> BatchRunner<WalkModel> {
        BatchRunner::from_model()
            .variable_param("walkers", [1i64, 2])
            .variable_param("limit", [3i64, 5, 8])
            .iterations(2)
            .max_steps(200)
            .seed(100)
            .model_reporter("max", |m: &WalkModel| {
                json!(m.schedule().iter().map(|w| w.position.abs()).max().unwrap_or(0))
            })
            .agent_reporter("position", |w: &Walker| json!(w.position))
    }

    #[test]
    fn test_run_specs_order_and_seeds() {
        let specs = runner().run_specs().unwrap();
        assert_eq!(specs.len(), 12);

        let combos: Vec<(i64, i64)> = specs
            .iter()
            .step_by(2)
            .map(|s| {
                (
                    s.params.get_i64("walkers").unwrap(),
                    s.params.get_i64("limit").unwrap(),
                )
            })
            .collect();
        assert_eq!(combos, vec![(1, 3), (1, 5), (1, 8), (2, 3), (2, 5), (2, 8)]);

        assert_eq!(specs[0].iteration, 0);
        assert_eq!(specs[1].iteration, 1);
        assert_eq!(specs[1].params, specs[0].params);
        assert!(specs.iter().enumerate().all(|(k, s)| s.seed == 100 + k as u64));
    }

    #[test]
    fn test_empty_variable_is_invalid() {
        let runner = runner().variable_param("limit", Vec::<i64>::new());
        assert!(matches!(runner.run_specs(), Err(SimError::InvalidSweep(_))));
    }

    #[test]
    fn test_no_variables_yields_iterations() {
        let runner: BatchRunner<WalkModel> = BatchRunner::from_model().iterations(3);
        assert_eq!(runner.run_specs().unwrap().len(), 3);
    }

    #[test]
    fn test_run_all_parallel_matches_sequential() {
        let parallel = runner().run_all().unwrap();
        let sequential = runner().sequential(true).run_all().unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.runs.len(), 12);
        for run in &parallel.runs {
            let limit = run.params.get_i64("limit").unwrap();
            let max = run.model_vars["max"].as_i64().unwrap();
            assert!(max >= limit || run.steps == 200);
            assert_eq!(run.agent_vars.len(), run.params.get_usize("walkers").unwrap());
        }
    }

    #[test]
    fn test_result_tables() {
        let results = runner().fixed_param("note", "x").run_all().unwrap();
        let model_table = results.model_vars_table();
        assert_eq!(
            model_table.columns,
            vec!["run_id", "iteration", "walkers", "limit", "note", "steps", "max"]
        );
        assert_eq!(model_table.len(), 12);
        assert_eq!(model_table.rows[3][2], json!(1));
        assert_eq!(model_table.rows[3][4], json!("x"));

        let agent_table = results.agent_vars_table();
        assert_eq!(agent_table.columns, vec!["run_id", "agent_id", "position"]);
        // 6 runs with one walker and 6 with two
        assert_eq!(agent_table.len(), 18);
    }

    #[test]
    fn test_with_config() {
        let config = SweepConfig::from_str(
            "[batch]\niterations = 2\nmax_steps = 10\nseed = 7\n[variable]\nwalkers = [1, 2, 3]\n",
        )
        .unwrap();
        let runner: BatchRunner<WalkModel> = BatchRunner::from_model().with_config(&config);
        let specs = runner.run_specs().unwrap();
        assert_eq!(specs.len(), 6);
        assert_eq!(specs[0].seed, 7);
        assert_eq!(runner.run_all().unwrap().runs[5].steps, 10);
    }

    #[test]
    fn test_config_variables_expand_in_file_order() {
        let config = SweepConfig::from_str("[variable]
walkers = [1, 2]
limit = [3, 5]
").unwrap();
        let runner: BatchRunner<WalkModel> = BatchRunner::from_model().with_config(&config);
        let combos: Vec<(i64, i64)> = runner
            .run_specs()
            .unwrap()
            .iter()
            .map(|spec| {
                (
                    spec.params.get_i64("walkers").unwrap(),
                    spec.params.get_i64("limit").unwrap(),
                )
            })
            .collect();
        assert_eq!(combos, vec![(1, 3), (1, 5), (2, 3), (2, 5)]);
    }

    #[test]
    fn test_factory_error_aborts() {
        let runner: BatchRunner<WalkModel> =
            BatchRunner::new(|_: &Params, _| Err(SimError::model("no model")));
        assert!(matches!(runner.run_all(), Err(SimError::Model(_))));
    }
}
