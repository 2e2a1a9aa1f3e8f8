//! Virus on a Network
//!
//! A random graph of agents, one per node. Each step has two stages: in
//! `spread` infected agents try to infect susceptible neighbors, in `check`
//! infected agents may notice, recover and possibly gain resistance.

use abm_core::abm_types::{
    AgentId, ChartSeries, EdgePortrayal, NetworkPortrayal, NodePortrayal, Params, UserParam,
};
use abm_core::{
    Activation, Agent, BatchRunner, DataCollector, FromParams, Graph, Model, ModelCore,
    NetworkGrid, Schedule, ScheduleError, SimError, StagedActivation,
};
use abm_viz::{ChartModule, Elements, NetworkModule, TextElement};
use rand::seq::index;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::registry::DemoModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Susceptible,
    Infected,
    Resistant,
}

/// Infection probabilities shared by every agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disease {
    pub virus_spread_chance: f64,
    pub virus_check_frequency: f64,
    pub recovery_chance: f64,
    pub gain_resistance_chance: f64,
}

pub struct VirusAgent {
    id: AgentId,
    node: usize,
    pub state: State,
}

impl VirusAgent {
    pub fn node(&self) -> usize {
        self.node
    }

    fn spread(&self, model: &mut VirusModel) {
        if self.state != State::Infected {
            return;
        }
        let chance = model.disease.virus_spread_chance;
        let neighbors = model
            .network
            .get_cell_list_contents(&model.network.get_neighbors(self.node, false));
        for id in neighbors {
            let infect = model.core.rng().gen::<f64>() < chance;
            if let Some(neighbor) = model.schedule.get_mut(id) {
                if neighbor.state == State::Susceptible && infect {
                    neighbor.state = State::Infected;
                }
            }
        }
    }

    fn check(&mut self, model: &mut VirusModel) {
        if self.state != State::Infected {
            return;
        }
        let disease = model.disease;
        let rng = model.core.rng();
        if rng.gen::<f64>() >= disease.virus_check_frequency {
            return;
        }
        if rng.gen::<f64>() < disease.recovery_chance {
            self.state = if rng.gen::<f64>() < disease.gain_resistance_chance {
                State::Resistant
            } else {
                State::Susceptible
            };
        }
    }
}

impl Agent for VirusAgent {
    type Model = VirusModel;

    fn unique_id(&self) -> AgentId {
        self.id
    }

    fn step(&mut self, model: &mut VirusModel) -> Result<(), SimError> {
        self.spread(model);
        self.check(model);
        Ok(())
    }

    fn stage(&mut self, stage: &str, model: &mut VirusModel) -> Result<(), SimError> {
        match stage {
            "spread" => self.spread(model),
            "check" => self.check(model),
            other => {
                return Err(ScheduleError::UnknownStage {
                    stage: other.to_string(),
                    agent: self.id,
                }
                .into())
            }
        }
        Ok(())
    }
}

pub struct VirusModel {
    core: ModelCore,
    schedule: Schedule<VirusAgent>,
    network: NetworkGrid,
    collector: DataCollector<VirusModel>,
    disease: Disease,
}

impl VirusModel {
    pub fn new(
        num_nodes: usize,
        avg_node_degree: f64,
        initial_outbreak_size: usize,
        disease: Disease,
        seed: Option<u64>,
    ) -> Result<Self, SimError> {
        let mut core = ModelCore::new(seed);
        let graph = Graph::random_with_average_degree(num_nodes, avg_node_degree, core.rng());
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built contact network"
        );
        let staged = StagedActivation::new(["spread", "check"], true, false)?;

        let mut model = Self {
            core,
            schedule: Schedule::new(Activation::Staged(staged)),
            network: NetworkGrid::new(graph),
            collector: DataCollector::new()
                .model_reporter("infected", |m: &VirusModel| json!(m.count(State::Infected)))
                .model_reporter("susceptible", |m: &VirusModel| {
                    json!(m.count(State::Susceptible))
                })
                .model_reporter("resistant", |m: &VirusModel| json!(m.count(State::Resistant)))
                .agent_reporter("state", |a: &VirusAgent| json!(a.state)),
            disease,
        };

        let outbreak_size = initial_outbreak_size.min(num_nodes);
        let outbreak = index::sample(model.core.rng(), num_nodes, outbreak_size).into_vec();
        for node in 0..num_nodes {
            let id = model.next_id();
            let state = if outbreak.contains(&node) {
                State::Infected
            } else {
                State::Susceptible
            };
            model.network.place_agent(id, node)?;
            model.schedule.add(VirusAgent { id, node, state })?;
        }

        let sample = model.collector.sample(&model);
        model.collector.record(sample);
        Ok(model)
    }

    pub fn count(&self, state: State) -> usize {
        self.schedule.iter().filter(|a| a.state == state).count()
    }

    /// Resistant agents per susceptible agent, or `None` when nobody is
    /// susceptible.
    pub fn resistant_susceptible_ratio(&self) -> Option<f64> {
        let susceptible = self.count(State::Susceptible);
        (susceptible > 0).then(|| self.count(State::Resistant) as f64 / susceptible as f64)
    }

    pub fn network(&self) -> &NetworkGrid {
        &self.network
    }

    fn network_portrayal(&self) -> NetworkPortrayal {
        let state_of = |node: usize| {
            self.network
                .contents(node)
                .first()
                .and_then(|id| self.schedule.get(*id))
                .map(|a| a.state)
        };
        let nodes = (0..self.network.graph().node_count())
            .map(|node| NodePortrayal {
                id: node,
                size: 6.0,
                color: state_color(state_of(node)).to_string(),
                label: self.network.contents(node).first().map(|id| id.to_string()),
            })
            .collect();
        let edges = self
            .network
            .graph()
            .edges()
            .into_iter()
            .map(|(source, target)| {
                let hot = state_of(source) == Some(State::Infected)
                    && state_of(target) == Some(State::Infected);
                EdgePortrayal {
                    source,
                    target,
                    color: if hot { "#FF0000" } else { "#808080" }.to_string(),
                    width: if hot { 3.0 } else { 1.0 },
                }
            })
            .collect();
        NetworkPortrayal { nodes, edges }
    }
}

fn state_color(state: Option<State>) -> &'static str {
    match state {
        Some(State::Infected) => "#FF0000",
        Some(State::Susceptible) => "#008000",
        Some(State::Resistant) => "#808080",
        None => "#FFFFFF",
    }
}

impl Model for VirusModel {
    type Agent = VirusAgent;

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn schedule(&self) -> &Schedule<VirusAgent> {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule<VirusAgent> {
        &mut self.schedule
    }

    fn step(&mut self) -> Result<(), SimError> {
        abm_core::activate(self)?;
        let sample = self.collector.sample(self);
        self.collector.record(sample);

        if self.count(State::Infected) == 0 {
            debug!(step = self.schedule.steps(), "Outbreak is over");
            self.stop();
        }
        Ok(())
    }
}

impl FromParams for VirusModel {
    fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError> {
        let disease = Disease {
            virus_spread_chance: params.get_probability("virus_spread_chance")?,
            virus_check_frequency: params.get_probability("virus_check_frequency")?,
            recovery_chance: params.get_probability("recovery_chance")?,
            gain_resistance_chance: params.get_probability("gain_resistance_chance")?,
        };
        Self::new(
            params.get_usize("num_nodes")?,
            params.get_f64("avg_node_degree")?,
            params.get_usize("initial_outbreak_size")?,
            disease,
            seed,
        )
    }

    fn default_params() -> Params {
        Params::new()
            .with("num_nodes", 10i64)
            .with("avg_node_degree", 3i64)
            .with("initial_outbreak_size", 1i64)
            .with("virus_spread_chance", 0.4)
            .with("virus_check_frequency", 0.4)
            .with("recovery_chance", 0.3)
            .with("gain_resistance_chance", 0.5)
    }
}

fn virus_collector(model: &VirusModel) -> &DataCollector<VirusModel> {
    &model.collector
}

impl DemoModel for VirusModel {
    const NAME: &'static str = "virus";
    const TITLE: &'static str = "Virus on a Network";

    fn collector(&self) -> &DataCollector<Self> {
        &self.collector
    }

    fn user_params() -> Vec<UserParam> {
        vec![
            UserParam::slider("num_nodes", 10.0, 10.0, 100.0, 1.0),
            UserParam::slider("avg_node_degree", 3.0, 3.0, 8.0, 1.0),
            UserParam::slider("initial_outbreak_size", 1.0, 1.0, 10.0, 1.0),
            UserParam::slider("virus_spread_chance", 0.4, 0.0, 1.0, 0.1),
            UserParam::slider("virus_check_frequency", 0.4, 0.0, 1.0, 0.1),
            UserParam::slider("recovery_chance", 0.3, 0.0, 1.0, 0.1),
            UserParam::slider("gain_resistance_chance", 0.5, 0.0, 1.0, 0.1),
        ]
    }

    fn elements() -> Elements<Self> {
        vec![
            Box::new(NetworkModule::new(VirusModel::network_portrayal, 500, 500)),
            Box::new(ChartModule::new(
                vec![
                    ChartSeries::new("infected", "#FF0000"),
                    ChartSeries::new("susceptible", "#008000"),
                    ChartSeries::new("resistant", "#808080"),
                ],
                virus_collector,
            )),
            Box::new(TextElement::new(|m: &VirusModel| {
                match m.resistant_susceptible_ratio() {
                    Some(ratio) => format!("Resistant/Susceptible ratio: {:.2}", ratio),
                    None => "Resistant/Susceptible ratio: inf".to_string(),
                }
            })),
        ]
    }

    fn batch_runner() -> BatchRunner<Self> {
        BatchRunner::from_model()
            .model_reporter("infected", |m: &VirusModel| json!(m.count(State::Infected)))
            .model_reporter("resistant", |m: &VirusModel| json!(m.count(State::Resistant)))
            .agent_reporter("state", |a: &VirusAgent| json!(a.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disease(spread: f64, check: f64, recovery: f64, resistance: f64) -> Disease {
        Disease {
            virus_spread_chance: spread,
            virus_check_frequency: check,
            recovery_chance: recovery,
            gain_resistance_chance: resistance,
        }
    }

    #[test]
    fn test_initial_outbreak() {
        let model = VirusModel::new(20, 4.0, 3, disease(0.4, 0.4, 0.3, 0.5), Some(1)).unwrap();
        assert_eq!(model.schedule().len(), 20);
        assert_eq!(model.count(State::Infected), 3);
        assert_eq!(model.count(State::Susceptible), 17);
        assert_eq!(model.network().graph().edge_count(), 40);
    }

    #[test]
    fn test_certain_spread_reaches_component() {
        // no recovery, so infection only grows
        let mut model = VirusModel::new(30, 4.0, 1, disease(1.0, 0.0, 0.0, 0.0), Some(6)).unwrap();
        let before = model.count(State::Infected);
        model.run_for(30).unwrap();
        assert!(model.count(State::Infected) >= before);
        assert_eq!(model.count(State::Resistant), 0);
        for agent in model.schedule().iter().filter(|a| a.state == State::Infected) {
            for node in model.network().get_neighbors(agent.node(), false) {
                let id = model.network().contents(node)[0];
                assert_eq!(model.schedule().get(id).unwrap().state, State::Infected);
            }
        }
    }

    #[test]
    fn test_certain_recovery_with_resistance_ends_outbreak() {
        let mut model = VirusModel::new(10, 3.0, 2, disease(0.0, 1.0, 1.0, 1.0), Some(2)).unwrap();
        let taken = model.run_model().unwrap();
        assert_eq!(taken, 1);
        assert_eq!(model.count(State::Resistant), 2);
        assert_eq!(model.count(State::Infected), 0);
        assert!(!model.running());
    }

    #[test]
    fn test_time_advances_per_stage() {
        let mut model = VirusModel::new(10, 3.0, 1, disease(0.0, 0.0, 0.0, 0.0), Some(3)).unwrap();
        model.step().unwrap();
        assert_eq!(model.schedule().steps(), 1);
        assert!((model.schedule().time() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_and_portrayal() {
        let model = VirusModel::new(10, 3.0, 1, disease(0.4, 0.4, 0.3, 0.5), Some(4)).unwrap();
        assert_eq!(model.resistant_susceptible_ratio(), Some(0.0));

        let drawing = model.network_portrayal();
        assert_eq!(drawing.nodes.len(), 10);
        assert_eq!(drawing.edges.len(), model.network().graph().edge_count());
        let red = drawing.nodes.iter().filter(|n| n.color == "#FF0000").count();
        assert_eq!(red, 1);
    }
}
