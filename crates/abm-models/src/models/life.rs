//! Conway's Game of Life
//!
//! One cell agent per grid cell under simultaneous activation: every cell
//! decides its next state from the current generation in `step`, then all
//! of them commit it in `advance`.

use abm_core::abm_types::{AgentId, ChartSeries, Coord, Params, Portrayal, UserParam};
use abm_core::{
    Activation, Agent, BatchRunner, DataCollector, FromParams, Model, ModelCore, Neighborhood,
    Schedule, SimError, SingleGrid,
};
use abm_viz::{CanvasGrid, ChartModule, Elements, TextElement};
use rand::Rng;
use serde_json::json;

use crate::registry::DemoModel;

/// Default grid size, also the size drawn by the browser canvas.
const WIDTH: usize = 50;
const HEIGHT: usize = 50;

pub struct Cell {
    id: AgentId,
    pos: Coord,
    pub alive: bool,
    next_alive: bool,
}

impl Cell {
    pub fn pos(&self) -> Coord {
        self.pos
    }
}

impl Agent for Cell {
    type Model = LifeModel;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&mut self, model: &mut LifeModel) -> Result<(), SimError> {
        let live_neighbors = model
            .grid
            .get_neighbors(self.pos, Neighborhood::Moore, false, 1)
            .into_iter()
            .filter_map(|id| model.schedule.get(id))
            .filter(|cell| cell.alive)
            .count();

        self.next_alive = matches!((self.alive, live_neighbors), (true, 2) | (_, 3));
        Ok(())
    }

    fn advance(&mut self, _model: &mut LifeModel) -> Result<(), SimError> {
        self.alive = self.next_alive;
        Ok(())
    }
}

pub struct LifeModel {
    core: ModelCore,
    schedule: Schedule<Cell>,
    grid: SingleGrid,
    collector: DataCollector<LifeModel>,
}

impl LifeModel {
    /// A torus board where each cell starts alive with probability `density`.
    pub fn new(width: usize, height: usize, density: f64, seed: Option<u64>) -> Result<Self, SimError> {
        let mut model = Self::empty(width, height, seed)?;
        let ids: Vec<AgentId> = model.schedule.agent_ids().to_vec();
        for id in ids {
            let alive = model.core.rng().gen::<f64>() < density;
            if let Some(cell) = model.schedule.get_mut(id) {
                cell.alive = alive;
            }
        }
        model.record();
        Ok(model)
    }

    /// A board with exactly the given cells alive.
    pub fn from_pattern(
        width: usize,
        height: usize,
        alive: &[Coord],
        seed: Option<u64>,
    ) -> Result<Self, SimError> {
        let mut model = Self::empty(width, height, seed)?;
        model.schedule.for_each_mut(|cell| cell.alive = alive.contains(&cell.pos));
        model.record();
        Ok(model)
    }

    fn empty(width: usize, height: usize, seed: Option<u64>) -> Result<Self, SimError> {
        let mut model = Self {
            core: ModelCore::new(seed),
            schedule: Schedule::new(Activation::Simultaneous),
            grid: SingleGrid::new(width, height, true)?,
            collector: DataCollector::new()
                .model_reporter("alive", |m: &LifeModel| json!(m.alive_count())),
        };
        let cells: Vec<Coord> = model.grid.shape().iter_coords().collect();
        for pos in cells {
            let id = model.next_id();
            model.grid.place_agent(id, pos)?;
            model.schedule.add(Cell {
                id,
                pos,
                alive: false,
                next_alive: false,
            })?;
        }
        Ok(model)
    }

    fn record(&mut self) {
        let sample = self.collector.sample(self);
        self.collector.record(sample);
    }

    pub fn alive_count(&self) -> usize {
        self.schedule.iter().filter(|cell| cell.alive).count()
    }

    /// Live cells, row by row.
    pub fn alive_cells(&self) -> Vec<Coord> {
        let mut cells: Vec<Coord> = self
            .schedule
            .iter()
            .filter(|cell| cell.alive)
            .map(|cell| cell.pos)
            .collect();
        cells.sort_by_key(|pos| (pos.y, pos.x));
        cells
    }
}

impl Model for LifeModel {
    type Agent = Cell;

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn schedule(&self) -> &Schedule<Cell> {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule<Cell> {
        &mut self.schedule
    }

    fn step(&mut self) -> Result<(), SimError> {
        abm_core::activate(self)?;
        self.record();
        Ok(())
    }
}

impl FromParams for LifeModel {
    fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError> {
        Self::new(
            params.get_usize("width")?,
            params.get_usize("height")?,
            params.get_probability("density")?,
            seed,
        )
    }

    fn default_params() -> Params {
        Params::new()
            .with("width", WIDTH as i64)
            .with("height", HEIGHT as i64)
            .with("density", 0.1)
    }
}

fn life_grid(model: &LifeModel) -> &SingleGrid {
    &model.grid
}

fn life_collector(model: &LifeModel) -> &DataCollector<LifeModel> {
    &model.collector
}

impl DemoModel for LifeModel {
    const NAME: &'static str = "life";
    const TITLE: &'static str = "Game of Life";

    fn collector(&self) -> &DataCollector<Self> {
        &self.collector
    }

    fn user_params() -> Vec<UserParam> {
        vec![UserParam::slider("density", 0.1, 0.0, 1.0, 0.05)]
    }

    fn elements() -> Elements<Self> {
        vec![
            Box::new(CanvasGrid::new(
                |cell: &Cell| cell.alive.then(|| Portrayal::rect(1.0, 1.0, "black")),
                life_grid,
                WIDTH,
                HEIGHT,
                500,
                500,
            )),
            Box::new(ChartModule::new(
                vec![ChartSeries::new("alive", "green")],
                life_collector,
            )),
            Box::new(TextElement::new(|m: &LifeModel| {
                format!("Live cells: {}", m.alive_count())
            })),
        ]
    }

    fn batch_runner() -> BatchRunner<Self> {
        BatchRunner::from_model().model_reporter("alive", |m: &LifeModel| json!(m.alive_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blinker_oscillates() {
        let horizontal = [Coord::new(1, 2), Coord::new(2, 2), Coord::new(3, 2)];
        let vertical = vec![Coord::new(2, 1), Coord::new(2, 2), Coord::new(2, 3)];
        let mut model = LifeModel::from_pattern(5, 5, &horizontal, Some(0)).unwrap();

        model.step().unwrap();
        assert_eq!(model.alive_cells(), vertical);
        model.step().unwrap();
        assert_eq!(model.alive_cells(), horizontal.to_vec());
    }

    #[test]
    fn test_block_is_still() {
        let block = [
            Coord::new(1, 1),
            Coord::new(2, 1),
            Coord::new(1, 2),
            Coord::new(2, 2),
        ];
        let mut model = LifeModel::from_pattern(6, 6, &block, Some(0)).unwrap();
        model.run_for(5).unwrap();
        assert_eq!(model.alive_cells(), block.to_vec());
    }

    #[test]
    fn test_lonely_cell_dies() {
        let mut model = LifeModel::from_pattern(4, 4, &[Coord::new(1, 1)], Some(0)).unwrap();
        model.step().unwrap();
        assert_eq!(model.alive_count(), 0);
        assert_eq!(
            model.collector.model_vars("alive").unwrap(),
            &[json!(1), json!(0)]
        );
    }

    #[test]
    fn test_density_populates_board() {
        let model = LifeModel::new(20, 20, 0.5, Some(8)).unwrap();
        assert_eq!(model.schedule().len(), 400);
        let alive = model.alive_count();
        assert!(alive > 120 && alive < 280);

        let full = LifeModel::new(5, 5, 1.0, Some(8)).unwrap();
        assert_eq!(full.alive_count(), 25);
    }
}
