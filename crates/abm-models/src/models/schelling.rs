//! Schelling Segregation
//!
//! Two kinds of agents on a torus grid. An agent is happy when at least
//! `homophily` of its Moore neighbors share its kind; unhappy agents move to
//! a random empty cell. Mild preferences are enough to sort the grid.

use abm_core::abm_types::{AgentId, ChartSeries, Params, Portrayal, UserParam};
use abm_core::{
    Activation, Agent, BatchRunner, DataCollector, FromParams, Model, ModelCore, Neighborhood,
    Schedule, SimError, SingleGrid,
};
use abm_viz::{CanvasGrid, ChartModule, Elements, TextElement};
use rand::Rng;
use serde_json::json;
use tracing::debug;

use crate::registry::DemoModel;

/// Default grid size, also the size drawn by the browser canvas.
const WIDTH: usize = 20;
const HEIGHT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Majority,
    Minority,
}

pub struct SchellingAgent {
    id: AgentId,
    pub kind: Kind,
}

impl Agent for SchellingAgent {
    type Model = SchellingModel;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&mut self, model: &mut SchellingModel) -> Result<(), SimError> {
        let Some(pos) = model.grid.position_of(self.id) else {
            return Err(SimError::model(format!("agent {} is not on the grid", self.id)));
        };
        let similar = model
            .grid
            .get_neighbors(pos, Neighborhood::Moore, false, 1)
            .into_iter()
            .filter_map(|id| model.schedule.get(id))
            .filter(|neighbor| neighbor.kind == self.kind)
            .count();

        if similar < model.homophily {
            // a full grid leaves unhappy agents where they are
            if model.grid.exists_empty_cells() {
                model.grid.move_to_empty(self.id, model.core.rng())?;
            }
        } else {
            model.happy += 1;
        }
        Ok(())
    }
}

pub struct SchellingModel {
    core: ModelCore,
    schedule: Schedule<SchellingAgent>,
    grid: SingleGrid,
    collector: DataCollector<SchellingModel>,
    homophily: usize,
    happy: usize,
}

impl SchellingModel {
    pub fn new(
        width: usize,
        height: usize,
        density: f64,
        minority_pc: f64,
        homophily: usize,
        seed: Option<u64>,
    ) -> Result<Self, SimError> {
        let mut model = Self {
            core: ModelCore::new(seed),
            schedule: Schedule::new(Activation::Random),
            grid: SingleGrid::new(width, height, true)?,
            collector: DataCollector::new()
                .model_reporter("happy", |m: &SchellingModel| json!(m.happy))
                .agent_reporter("minority", |a: &SchellingAgent| {
                    json!(a.kind == Kind::Minority)
                }),
            homophily,
            happy: 0,
        };

        let cells: Vec<_> = model.grid.shape().iter_coords().collect();
        for pos in cells {
            if model.core.rng().gen::<f64>() >= density {
                continue;
            }
            let kind = if model.core.rng().gen::<f64>() < minority_pc {
                Kind::Minority
            } else {
                Kind::Majority
            };
            let id = model.next_id();
            model.grid.place_agent(id, pos)?;
            model.schedule.add(SchellingAgent { id, kind })?;
        }
        debug!(agents = model.schedule.len(), "Schelling grid populated");

        let sample = model.collector.sample(&model);
        model.collector.record(sample);
        Ok(model)
    }

    /// Agents that were happy during the last step.
    pub fn happy(&self) -> usize {
        self.happy
    }

    pub fn grid(&self) -> &SingleGrid {
        &self.grid
    }
}

impl Model for SchellingModel {
    type Agent = SchellingAgent;

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn schedule(&self) -> &Schedule<SchellingAgent> {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule<SchellingAgent> {
        &mut self.schedule
    }

    fn step(&mut self) -> Result<(), SimError> {
        self.happy = 0;
        abm_core::activate(self)?;
        let sample = self.collector.sample(self);
        self.collector.record(sample);

        if self.happy == self.schedule.len() {
            debug!(step = self.schedule.steps(), "Every agent is happy");
            self.stop();
        }
        Ok(())
    }
}

impl FromParams for SchellingModel {
    fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError> {
        Self::new(
            params.get_usize("width")?,
            params.get_usize("height")?,
            params.get_probability("density")?,
            params.get_probability("minority_pc")?,
            params.get_usize("homophily")?,
            seed,
        )
    }

    fn default_params() -> Params {
        Params::new()
            .with("width", WIDTH as i64)
            .with("height", HEIGHT as i64)
            .with("density", 0.8)
            .with("minority_pc", 0.2)
            .with("homophily", 3i64)
    }
}

fn schelling_grid(model: &SchellingModel) -> &SingleGrid {
    &model.grid
}

fn schelling_collector(model: &SchellingModel) -> &DataCollector<SchellingModel> {
    &model.collector
}

fn portray(agent: &SchellingAgent) -> Option<Portrayal> {
    let color = match agent.kind {
        Kind::Majority => "#ff0000",
        Kind::Minority => "#0000ff",
    };
    Some(Portrayal::circle(0.5, color))
}

impl DemoModel for SchellingModel {
    const NAME: &'static str = "schelling";
    const TITLE: &'static str = "Schelling Segregation";

    fn collector(&self) -> &DataCollector<Self> {
        &self.collector
    }

    fn user_params() -> Vec<UserParam> {
        vec![
            UserParam::slider("density", 0.8, 0.1, 1.0, 0.1),
            UserParam::slider("minority_pc", 0.2, 0.0, 1.0, 0.05),
            UserParam::slider("homophily", 3.0, 0.0, 8.0, 1.0),
        ]
    }

    fn elements() -> Elements<Self> {
        vec![
            Box::new(CanvasGrid::new(portray, schelling_grid, WIDTH, HEIGHT, 500, 500)),
            Box::new(ChartModule::new(
                vec![ChartSeries::new("happy", "black")],
                schelling_collector,
            )),
            Box::new(TextElement::new(|m: &SchellingModel| {
                format!("Happy agents: {}", m.happy)
            })),
        ]
    }

    fn batch_runner() -> BatchRunner<Self> {
        BatchRunner::from_model()
            .model_reporter("happy", |m: &SchellingModel| json!(m.happy))
            .model_reporter("agents", |m: &SchellingModel| json!(m.schedule.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_matches_grid() {
        let model = SchellingModel::new(10, 10, 0.5, 0.3, 2, Some(4)).unwrap();
        assert_eq!(model.grid().agent_count(), model.schedule().len());
        assert_eq!(
            model.grid().empties().len(),
            100 - model.schedule().len()
        );
        assert!(model.schedule().len() > 20 && model.schedule().len() < 80);
    }

    #[test]
    fn test_zero_homophily_is_happy_immediately() {
        let mut model = SchellingModel::new(8, 8, 0.6, 0.5, 0, Some(9)).unwrap();
        let taken = model.run_for(10).unwrap();
        assert_eq!(taken, 1);
        assert!(!model.running());
        assert_eq!(model.happy(), model.schedule().len());
    }

    #[test]
    fn test_unreachable_homophily_keeps_running() {
        let mut model = SchellingModel::new(6, 6, 0.5, 0.5, 9, Some(2)).unwrap();
        let agents = model.schedule().len();
        model.run_for(5).unwrap();
        assert!(model.running());
        assert_eq!(model.happy(), 0);
        // moving never loses or duplicates agents
        assert_eq!(model.grid().agent_count(), agents);
    }

    #[test]
    fn test_happy_series_is_recorded() {
        let mut model = SchellingModel::new(10, 10, 0.7, 0.3, 3, Some(5)).unwrap();
        model.run_for(3).unwrap();
        let happy = model.collector.model_vars("happy").unwrap();
        assert_eq!(happy[0], json!(0));
        assert_eq!(happy.len(), model.schedule().steps() as usize + 1);
    }
}
