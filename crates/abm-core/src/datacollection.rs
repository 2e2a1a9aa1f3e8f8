//! Data Collection
//!
//! A [`DataCollector`] records model-level and agent-level variables each
//! time it is asked to collect, plus free-form tables a model fills in
//! itself. Everything reads back as a [`Table`] of JSON values.
//!
//! A collector that lives inside the model it observes cannot take `&mut
//! self` and `&model` at once, so collection is split: [`DataCollector::sample`]
//! only borrows, and [`DataCollector::record`] stores the result.

use abm_types::AgentId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::agent::Agent;
use crate::model::Model;

/// Errors raised when filling collector tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectorError {
    #[error("no table named '{0}'")]
    UnknownTable(String),
    #[error("row for table '{table}' is missing column '{column}'")]
    MissingColumn { table: String, column: String },
}

/// Columns plus rows of JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. The row must have one value per column.
    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name.
    pub fn records(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        self.rows.iter().map(move |row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }
}

/// Reports one model-level value.
pub type ModelReporter<M> = Box<dyn Fn(&M) -> Value + Send + Sync>;

/// Reports one value per agent.
pub type AgentReporter<A> = Box<dyn Fn(&A) -> Value + Send + Sync>;

/// One agent's reported values at one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub step: u64,
    pub agent_id: AgentId,
    pub values: Vec<Value>,
}

/// Values read from a model, ready to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    step: u64,
    model: Vec<Value>,
    agents: Vec<AgentRecord>,
}

/// Collects model and agent variables over the course of a run.
pub struct DataCollector<M: Model> {
    model_reporters: Vec<(String, ModelReporter<M>)>,
    agent_reporters: Vec<(String, AgentReporter<M::Agent>)>,
    model_steps: Vec<u64>,
    model_vars: Vec<Vec<Value>>,
    agent_records: Vec<AgentRecord>,
    tables: BTreeMap<String, Table>,
}

impl<M: Model> DataCollector<M> {
    pub fn new() -> Self {
        Self {
            model_reporters: Vec::new(),
            agent_reporters: Vec::new(),
            model_steps: Vec::new(),
            model_vars: Vec::new(),
            agent_records: Vec::new(),
            tables: BTreeMap::new(),
        }
    }

    pub fn model_reporter<F>(mut self, name: impl Into<String>, reporter: F) -> Self
    where
        F: Fn(&M) -> Value + Send + Sync + 'static,
    {
        self.model_reporters.push((name.into(), Box::new(reporter)));
        self.model_vars.push(Vec::new());
        self
    }

    pub fn agent_reporter<F>(mut self, name: impl Into<String>, reporter: F) -> Self
    where
        F: Fn(&M::Agent) -> Value + Send + Sync + 'static,
    {
        self.agent_reporters.push((name.into(), Box::new(reporter)));
        self
    }

    /// Declares a free-form table filled through [`Self::add_table_row`].
    pub fn table<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.tables.insert(name.into(), Table::new(columns));
        self
    }

    pub fn model_reporter_names(&self) -> impl Iterator<Item = &str> {
        self.model_reporters.iter().map(|(name, _)| name.as_str())
    }

    pub fn agent_reporter_names(&self) -> impl Iterator<Item = &str> {
        self.agent_reporters.iter().map(|(name, _)| name.as_str())
    }

    /// Reads every reporter from the model without storing anything.
    ///
    /// Agents are visited in activation order and tagged with the number of
    /// completed steps.
    pub fn sample(&self, model: &M) -> Sample {
        let step = model.schedule().steps();
        let values = self
            .model_reporters
            .iter()
            .map(|(_, reporter)| reporter(model))
            .collect();

        let agents = if self.agent_reporters.is_empty() {
            Vec::new()
        } else {
            model
                .schedule()
                .iter()
                .map(|agent| AgentRecord {
                    step,
                    agent_id: agent.unique_id(),
                    values: self
                        .agent_reporters
                        .iter()
                        .map(|(_, reporter)| reporter(agent))
                        .collect(),
                })
                .collect()
        };

        Sample {
            step,
            model: values,
            agents,
        }
    }

    /// Stores a sample taken by [`Self::sample`].
    pub fn record(&mut self, sample: Sample) {
        self.model_steps.push(sample.step);
        for (column, value) in self.model_vars.iter_mut().zip(sample.model) {
            column.push(value);
        }
        self.agent_records.extend(sample.agents);
    }

    /// Samples and records in one go.
    pub fn collect(&mut self, model: &M) {
        let sample = self.sample(model);
        self.record(sample);
    }

    /// Number of collections recorded so far.
    pub fn collections(&self) -> usize {
        self.model_steps.len()
    }

    /// Every value a model reporter produced, oldest first.
    pub fn model_vars(&self, name: &str) -> Option<&[Value]> {
        let index = self.model_reporters.iter().position(|(n, _)| n == name)?;
        Some(&self.model_vars[index])
    }

    /// Most recent value of a model reporter.
    pub fn latest(&self, name: &str) -> Option<&Value> {
        self.model_vars(name)?.last()
    }

    pub fn agent_records(&self) -> &[AgentRecord] {
        &self.agent_records
    }

    /// One row per collection: `step` then each model reporter.
    pub fn model_vars_table(&self) -> Table {
        let mut table = Table::new(
            std::iter::once("step").chain(self.model_reporter_names()),
        );
        for (row_index, step) in self.model_steps.iter().enumerate() {
            let mut row = Vec::with_capacity(table.columns.len());
            row.push(Value::from(*step));
            row.extend(
                self.model_vars
                    .iter()
                    .map(|column| column.get(row_index).cloned().unwrap_or(Value::Null)),
            );
            table.push_row(row);
        }
        table
    }

    /// One row per agent per collection: `step`, `agent_id` then each agent
    /// reporter.
    pub fn agent_vars_table(&self) -> Table {
        let mut table = Table::new(
            ["step", "agent_id"]
                .into_iter()
                .chain(self.agent_reporter_names()),
        );
        for record in &self.agent_records {
            let mut row = vec![Value::from(record.step), Value::from(record.agent_id.0)];
            row.extend(record.values.iter().cloned());
            table.push_row(row);
        }
        table
    }

    /// Appends a row to a declared table. Keys beyond its columns are
    /// ignored.
    pub fn add_table_row(
        &mut self,
        table_name: &str,
        mut row: BTreeMap<String, Value>,
    ) -> Result<(), CollectorError> {
        let table = self
            .tables
            .get_mut(table_name)
            .ok_or_else(|| CollectorError::UnknownTable(table_name.to_string()))?;

        let mut values = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let value = row.remove(column).ok_or_else(|| CollectorError::MissingColumn {
                table: table_name.to_string(),
                column: column.clone(),
            })?;
            values.push(value);
        }
        table.push_row(values);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl<M: Model> Default for DataCollector<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> fmt::Debug for DataCollector<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCollector")
            .field("model_reporters", &self.model_reporter_names().collect::<Vec<_>>())
            .field("agent_reporters", &self.agent_reporter_names().collect::<Vec<_>>())
            .field("collections", &self.collections())
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}
