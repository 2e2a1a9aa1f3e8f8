//! Boltzmann Wealth
//!
//! Agents wander a multi-occupancy grid and hand one unit of wealth to a
//! random cellmate each step. Wealth starts equal and ends up unequal.

use abm_core::abm_types::{AgentId, ChartSeries, Coord, Params, Portrayal, UserParam};
use abm_core::{
    Activation, Agent, BatchRunner, DataCollector, FromParams, Model, ModelCore, MultiGrid,
    Neighborhood, Schedule, SimError,
};
use abm_viz::{CanvasGrid, ChartModule, Elements, TextElement};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use crate::registry::DemoModel;

/// Default grid size, also the size drawn by the browser canvas.
const WIDTH: usize = 10;
const HEIGHT: usize = 10;

pub struct WealthAgent {
    id: AgentId,
    pub wealth: u64,
}

impl WealthAgent {
    fn move_randomly(&self, model: &mut WealthModel) -> Result<(), SimError> {
        let Some(pos) = model.grid.position_of(self.id) else {
            return Err(SimError::model(format!("agent {} is not on the grid", self.id)));
        };
        let options = model
            .grid
            .get_neighborhood(pos, Neighborhood::Moore, false, 1);
        if let Some(&target) = options.choose(model.core.rng()) {
            model.grid.move_agent(self.id, target)?;
        }
        Ok(())
    }

    fn give_money(&mut self, model: &mut WealthModel) {
        let Some(pos) = model.grid.position_of(self.id) else {
            return;
        };
        let cellmates: Vec<AgentId> = model
            .grid
            .contents(pos)
            .iter()
            .copied()
            .filter(|&id| id != self.id)
            .collect();
        let Some(&other) = cellmates.choose(model.core.rng()) else {
            return;
        };
        if let Some(other) = model.schedule.get_mut(other) {
            other.wealth += 1;
            self.wealth -= 1;
        }
    }
}

impl Agent for WealthAgent {
    type Model = WealthModel;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&mut self, model: &mut WealthModel) -> Result<(), SimError> {
        self.move_randomly(model)?;
        if self.wealth > 0 {
            self.give_money(model);
        }
        Ok(())
    }
}

pub struct WealthModel {
    core: ModelCore,
    schedule: Schedule<WealthAgent>,
    grid: MultiGrid,
    collector: DataCollector<WealthModel>,
}

impl WealthModel {
    pub fn new(n: usize, width: usize, height: usize, seed: Option<u64>) -> Result<Self, SimError> {
        let mut model = Self {
            core: ModelCore::new(seed),
            schedule: Schedule::new(Activation::Random),
            grid: MultiGrid::new(width, height, true)?,
            collector: DataCollector::new()
                .model_reporter("gini", |m: &WealthModel| json!(m.gini()))
                .agent_reporter("wealth", |a: &WealthAgent| json!(a.wealth)),
        };

        for _ in 0..n {
            let id = model.next_id();
            let rng = model.core.rng();
            let pos = Coord::new(rng.gen_range(0..width), rng.gen_range(0..height));
            model.grid.place_agent(id, pos)?;
            model.schedule.add(WealthAgent { id, wealth: 1 })?;
        }

        let sample = model.collector.sample(&model);
        model.collector.record(sample);
        Ok(model)
    }

    pub fn grid(&self) -> &MultiGrid {
        &self.grid
    }

    pub fn total_wealth(&self) -> u64 {
        self.schedule.iter().map(|a| a.wealth).sum()
    }

    pub fn gini(&self) -> f64 {
        let wealths: Vec<u64> = self.schedule.iter().map(|a| a.wealth).collect();
        gini(&wealths)
    }
}

/// Gini coefficient of a wealth distribution; 0 for perfect equality.
pub fn gini(wealths: &[u64]) -> f64 {
    let total: u64 = wealths.iter().sum();
    if wealths.is_empty() || total == 0 {
        return 0.0;
    }
    let mut sorted = wealths.to_vec();
    sorted.sort_unstable();
    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &w)| w as f64 * (n - i as f64))
        .sum();
    let b = weighted / (n * total as f64);
    1.0 + 1.0 / n - 2.0 * b
}

impl Model for WealthModel {
    type Agent = WealthAgent;

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn schedule(&self) -> &Schedule<WealthAgent> {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule<WealthAgent> {
        &mut self.schedule
    }

    fn step(&mut self) -> Result<(), SimError> {
        abm_core::activate(self)?;
        let sample = self.collector.sample(self);
        self.collector.record(sample);
        Ok(())
    }
}

impl FromParams for WealthModel {
    fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError> {
        Self::new(
            params.get_usize("n")?,
            params.get_usize("width")?,
            params.get_usize("height")?,
            seed,
        )
    }

    fn default_params() -> Params {
        Params::new()
            .with("n", 50i64)
            .with("width", WIDTH as i64)
            .with("height", HEIGHT as i64)
    }
}

fn wealth_grid(model: &WealthModel) -> &MultiGrid {
    &model.grid
}

fn wealth_collector(model: &WealthModel) -> &DataCollector<WealthModel> {
    &model.collector
}

fn portray(agent: &WealthAgent) -> Option<Portrayal> {
    let portrayal = if agent.wealth > 0 {
        Portrayal::circle(0.5, "red")
    } else {
        Portrayal::circle(0.2, "grey").on_layer(1)
    };
    Some(portrayal)
}

impl DemoModel for WealthModel {
    const NAME: &'static str = "wealth";
    const TITLE: &'static str = "Boltzmann Wealth Model";

    fn collector(&self) -> &DataCollector<Self> {
        &self.collector
    }

    fn user_params() -> Vec<UserParam> {
        vec![
            UserParam::slider("n", 50.0, 2.0, 200.0, 1.0),
            UserParam::static_text("Agents start with one unit of wealth each."),
        ]
    }

    fn elements() -> Elements<Self> {
        vec![
            Box::new(CanvasGrid::new(portray, wealth_grid, WIDTH, HEIGHT, 500, 500)),
            Box::new(ChartModule::new(
                vec![ChartSeries::new("gini", "black")],
                wealth_collector,
            )),
            Box::new(TextElement::new(|m: &WealthModel| {
                format!("Gini: {:.3}", m.gini())
            })),
        ]
    }

    fn batch_runner() -> BatchRunner<Self> {
        BatchRunner::from_model()
            .model_reporter("gini", |m: &WealthModel| json!(m.gini()))
            .agent_reporter("wealth", |a: &WealthAgent| json!(a.wealth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_bounds() {
        assert_eq!(gini(&[1, 1, 1, 1]), 0.0);
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0, 0]), 0.0);
        // one agent holds everything
        let g = gini(&[0, 0, 0, 4]);
        assert!((g - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_wealth_is_conserved() {
        let mut model = WealthModel::new(40, 5, 5, Some(3)).unwrap();
        assert_eq!(model.total_wealth(), 40);
        model.run_for(30).unwrap();
        assert_eq!(model.total_wealth(), 40);
        assert_eq!(model.grid().agent_count(), 40);
    }

    #[test]
    fn test_inequality_emerges() {
        let mut model = WealthModel::new(50, 4, 4, Some(11)).unwrap();
        assert_eq!(model.gini(), 0.0);
        model.run_for(50).unwrap();
        assert!(model.gini() > 0.2);
    }

    #[test]
    fn test_collector_rows() {
        let mut model = WealthModel::new(10, 3, 3, Some(1)).unwrap();
        model.run_for(4).unwrap();
        // initial state plus one row per step
        assert_eq!(model.collector.collections(), 5);
        assert_eq!(model.collector.model_vars("gini").unwrap().len(), 5);
        assert_eq!(model.collector.agent_records().len(), 50);
    }

    #[test]
    fn test_portrayal_depends_on_wealth() {
        let rich = portray(&WealthAgent { id: AgentId(0), wealth: 2 }).unwrap();
        let poor = portray(&WealthAgent { id: AgentId(1), wealth: 0 }).unwrap();
        assert_eq!(rich.color, "red");
        assert_eq!(poor.layer, 1);
    }
}
