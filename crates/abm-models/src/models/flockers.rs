//! Flockers
//!
//! Boids in a toroidal continuous space. Each boid steers toward the
//! neighbors it can see, away from those that are too close, and along
//! their average heading.

use abm_core::abm_types::{AgentId, ChartSeries, Params, Point, Portrayal, UserParam};
use abm_core::{
    Activation, Agent, BatchRunner, ContinuousSpace, DataCollector, FromParams, Model, ModelCore,
    Schedule, SimError,
};
use abm_viz::{CanvasGrid, ChartModule, Elements, TextElement};
use rand::Rng;
use serde_json::json;

use crate::registry::DemoModel;

/// Default space size, also the extent drawn by the browser canvas.
const WIDTH: f64 = 100.0;
const HEIGHT: f64 = 100.0;

/// Steering weights and ranges shared by every boid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    pub speed: f64,
    pub vision: f64,
    pub separation: f64,
    pub cohere: f64,
    pub separate: f64,
    pub align: f64,
}

impl Default for Steering {
    fn default() -> Self {
        Self {
            speed: 1.0,
            vision: 10.0,
            separation: 2.0,
            cohere: 0.025,
            separate: 0.25,
            align: 0.04,
        }
    }
}

pub struct Boid {
    id: AgentId,
    /// Unit heading vector.
    pub velocity: Point,
}

impl Agent for Boid {
    type Model = FlockModel;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&mut self, model: &mut FlockModel) -> Result<(), SimError> {
        let Some(pos) = model.space.position_of(self.id) else {
            return Err(SimError::model(format!("boid {} is not in the space", self.id)));
        };
        let steering = model.steering;

        let mut cohere = Point::default();
        let mut separate = Point::default();
        let mut align = Point::default();
        let neighbors = model.space.get_neighbors(pos, steering.vision, false);
        for id in &neighbors {
            let (Some(other), Some(other_pos)) =
                (model.schedule.get(*id), model.space.position_of(*id))
            else {
                continue;
            };
            let heading = model.space.get_heading(pos, other_pos);
            cohere = cohere + heading;
            if model.space.get_distance(pos, other_pos) < steering.separation {
                separate = separate - heading;
            }
            align = align + other.velocity;
        }

        let n = neighbors.len().max(1) as f64;
        let steer = cohere.scale(steering.cohere)
            + separate.scale(steering.separate)
            + align.scale(steering.align);
        let velocity = (self.velocity + steer.scale(1.0 / n)).normalized();
        if velocity != Point::default() {
            self.velocity = velocity;
        }

        let target = pos + self.velocity.scale(steering.speed);
        model.space.move_agent(self.id, target)?;
        Ok(())
    }
}

pub struct FlockModel {
    core: ModelCore,
    schedule: Schedule<Boid>,
    space: ContinuousSpace,
    collector: DataCollector<FlockModel>,
    steering: Steering,
}

impl FlockModel {
    pub fn new(
        population: usize,
        width: f64,
        height: f64,
        steering: Steering,
        seed: Option<u64>,
    ) -> Result<Self, SimError> {
        let mut model = Self {
            core: ModelCore::new(seed),
            schedule: Schedule::new(Activation::Sequential),
            space: ContinuousSpace::new(width, height, true)?,
            collector: DataCollector::new()
                .model_reporter("alignment", |m: &FlockModel| json!(m.alignment())),
            steering,
        };

        for _ in 0..population {
            let id = model.next_id();
            let rng = model.core.rng();
            let pos = Point::new(rng.gen::<f64>() * width, rng.gen::<f64>() * height);
            let angle = rng.gen::<f64>() * std::f64::consts::TAU;
            let velocity = Point::new(angle.cos(), angle.sin());
            model.space.place_agent(id, pos)?;
            model.schedule.add(Boid { id, velocity })?;
        }

        let sample = model.collector.sample(&model);
        model.collector.record(sample);
        Ok(model)
    }

    /// Length of the mean heading: 1 when every boid flies the same way,
    /// near 0 when headings cancel out.
    pub fn alignment(&self) -> f64 {
        if self.schedule.is_empty() {
            return 0.0;
        }
        let sum = self
            .schedule
            .iter()
            .fold(Point::default(), |acc, boid| acc + boid.velocity);
        sum.scale(1.0 / self.schedule.len() as f64).norm()
    }

    pub fn space(&self) -> &ContinuousSpace {
        &self.space
    }
}

impl Model for FlockModel {
    type Agent = Boid;

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn schedule(&self) -> &Schedule<Boid> {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule<Boid> {
        &mut self.schedule
    }

    fn step(&mut self) -> Result<(), SimError> {
        abm_core::activate(self)?;
        let sample = self.collector.sample(self);
        self.collector.record(sample);
        Ok(())
    }
}

impl FromParams for FlockModel {
    fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError> {
        let steering = Steering {
            speed: params.get_f64("speed")?,
            vision: params.get_f64("vision")?,
            separation: params.get_f64("separation")?,
            ..Steering::default()
        };
        Self::new(
            params.get_usize("population")?,
            params.get_f64("width")?,
            params.get_f64("height")?,
            steering,
            seed,
        )
    }

    fn default_params() -> Params {
        Params::new()
            .with("population", 100i64)
            .with("width", WIDTH)
            .with("height", HEIGHT)
            .with("speed", 1.0)
            .with("vision", 10.0)
            .with("separation", 2.0)
    }
}

fn flock_space(model: &FlockModel) -> &ContinuousSpace {
    &model.space
}

fn flock_collector(model: &FlockModel) -> &DataCollector<FlockModel> {
    &model.collector
}

fn portray(boid: &Boid) -> Option<Portrayal> {
    let heading = boid.velocity.y.atan2(boid.velocity.x);
    Some(Portrayal::arrow(1.5, heading, "#1f4e79"))
}

impl DemoModel for FlockModel {
    const NAME: &'static str = "flockers";
    const TITLE: &'static str = "Boid Flockers";

    fn collector(&self) -> &DataCollector<Self> {
        &self.collector
    }

    fn user_params() -> Vec<UserParam> {
        vec![
            UserParam::slider("population", 100.0, 10.0, 300.0, 10.0),
            UserParam::slider("vision", 10.0, 1.0, 25.0, 1.0),
            UserParam::slider("separation", 2.0, 0.5, 10.0, 0.5),
        ]
    }

    fn elements() -> Elements<Self> {
        vec![
            Box::new(CanvasGrid::new(
                portray,
                flock_space,
                WIDTH as usize,
                HEIGHT as usize,
                500,
                500,
            )),
            Box::new(ChartModule::new(
                vec![ChartSeries::new("alignment", "#1f4e79")],
                flock_collector,
            )),
            Box::new(TextElement::new(|m: &FlockModel| {
                format!("Alignment: {:.3}", m.alignment())
            })),
        ]
    }

    fn batch_runner() -> BatchRunner<Self> {
        BatchRunner::from_model()
            .model_reporter("alignment", |m: &FlockModel| json!(m.alignment()))
    }
}
