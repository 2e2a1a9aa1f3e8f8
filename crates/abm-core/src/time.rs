//! Time and Activation
//!
//! A [`Schedule`] decides which agents act in a step and in what order. The
//! activation regime can have a serious impact on model behavior, so it is
//! chosen explicitly with [`Activation`] and can be swapped without touching
//! agent code.
//!
//! Agents are checked out of the schedule while they act. An agent removed
//! during a step is skipped if it has not acted yet; an agent added during a
//! step first acts in the next step.

use abm_types::AgentId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::trace;

use crate::agent::Agent;
use crate::error::SimError;
use crate::model::Model;

/// Errors raised by schedules.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("agent {0} is already scheduled")]
    DuplicateAgent(AgentId),
    #[error("agent {agent} has no stage named '{stage}'")]
    UnknownStage { stage: String, agent: AgentId },
    #[error("staged activation needs at least one stage")]
    NoStages,
}

/// Stage list and shuffling policy for staged activation.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedActivation {
    stages: Vec<String>,
    shuffle: bool,
    shuffle_between_stages: bool,
}

impl StagedActivation {
    /// `shuffle` reorders agents at the start of each step;
    /// `shuffle_between_stages` reorders them again after every stage.
    pub fn new<S: Into<String>>(
        stages: impl IntoIterator<Item = S>,
        shuffle: bool,
        shuffle_between_stages: bool,
    ) -> Result<Self, ScheduleError> {
        let stages: Vec<String> = stages.into_iter().map(Into::into).collect();
        if stages.is_empty() {
            return Err(ScheduleError::NoStages);
        }
        Ok(Self {
            stages,
            shuffle,
            shuffle_between_stages,
        })
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Time that passes per stage; one full step is one unit of time.
    pub fn stage_time(&self) -> f64 {
        1.0 / self.stages.len() as f64
    }
}

/// Activation regime.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Each agent once per step, in the order they were added.
    Sequential,
    /// Each agent once per step, reshuffled every step.
    Random,
    /// Every agent steps, then every agent advances.
    Simultaneous,
    /// As many activations as agents, each picking an agent uniformly with
    /// replacement: every agent acts once per step on average.
    RandomWithReplacement,
    /// Named stages; all agents finish a stage before the next begins.
    Staged(StagedActivation),
}

/// Agents of one model plus the activation regime and clock.
#[derive(Debug, Clone)]
pub struct Schedule<A> {
    activation: Activation,
    agents: HashMap<AgentId, A>,
    order: Vec<AgentId>,
    active: Option<AgentId>,
    active_removed: bool,
    steps: u64,
    time: f64,
}

impl<A: Agent> Schedule<A> {
    pub fn new(activation: Activation) -> Self {
        Self {
            activation,
            agents: HashMap::new(),
            order: Vec::new(),
            active: None,
            active_removed: false,
            steps: 0,
            time: 0.0,
        }
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    /// Adds an agent at the end of the activation order.
    pub fn add(&mut self, agent: A) -> Result<(), ScheduleError> {
        let id = agent.unique_id();
        if self.agents.contains_key(&id) || self.active == Some(id) {
            return Err(ScheduleError::DuplicateAgent(id));
        }
        self.agents.insert(id, agent);
        self.order.push(id);
        Ok(())
    }

    /// Removes an agent. Removing the agent that is currently acting marks
    /// it for removal once its activation returns, and yields `None`.
    pub fn remove(&mut self, id: AgentId) -> Option<A> {
        if self.active == Some(id) {
            if !self.active_removed {
                self.active_removed = true;
                self.order.retain(|other| *other != id);
            }
            return None;
        }
        let agent = self.agents.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(agent)
    }

    /// Looks up an agent. The agent currently acting is not visible.
    pub fn get(&self, id: AgentId) -> Option<&A> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut A> {
        self.agents.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id) || (self.active == Some(id) && !self.active_removed)
    }

    /// Agent ids in activation order.
    pub fn agent_ids(&self) -> &[AgentId] {
        &self.order
    }

    /// Agents in activation order.
    pub fn iter(&self) -> impl Iterator<Item = &A> + '_ {
        self.order.iter().filter_map(move |id| self.agents.get(id))
    }

    /// Applies `f` to every agent in activation order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut A)) {
        for id in &self.order {
            if let Some(agent) = self.agents.get_mut(id) {
                f(agent);
            }
        }
    }

    /// Number of agents in the schedule, including one that is acting.
    pub fn get_agent_count(&self) -> usize {
        self.agents.len() + usize::from(self.active.is_some() && !self.active_removed)
    }

    pub fn len(&self) -> usize {
        self.get_agent_count()
    }

    pub fn is_empty(&self) -> bool {
        self.get_agent_count() == 0
    }

    /// Completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Elapsed model time; advances fractionally under staged activation.
    pub fn time(&self) -> f64 {
        self.time
    }

    fn check_out(&mut self, id: AgentId) -> Option<A> {
        let agent = self.agents.remove(&id)?;
        self.active = Some(id);
        self.active_removed = false;
        Some(agent)
    }

    fn check_in(&mut self, agent: A) {
        if let Some(id) = self.active.take() {
            if !self.active_removed {
                self.agents.insert(id, agent);
            }
        }
        self.active_removed = false;
    }
}

#[derive(Clone, Copy)]
enum Phase<'a> {
    Step,
    Advance,
    Stage(&'a str),
}

/// Runs one step of the model's schedule under its activation regime.
pub fn activate<M: Model>(model: &mut M) -> Result<(), SimError> {
    let activation = model.schedule().activation.clone();
    match &activation {
        Activation::Sequential => {
            let order = model.schedule().order.clone();
            activate_each(model, &order, Phase::Step)?;
            finish_step(model.schedule_mut(), 1.0);
        }
        Activation::Random => {
            shuffle_order(model);
            let order = model.schedule().order.clone();
            activate_each(model, &order, Phase::Step)?;
            finish_step(model.schedule_mut(), 1.0);
        }
        Activation::Simultaneous => {
            let order = model.schedule().order.clone();
            activate_each(model, &order, Phase::Step)?;
            activate_each(model, &order, Phase::Advance)?;
            finish_step(model.schedule_mut(), 1.0);
        }
        Activation::RandomWithReplacement => {
            let order = model.schedule().order.clone();
            let picks: Vec<AgentId> = if order.is_empty() {
                Vec::new()
            } else {
                (0..order.len())
                    .map(|_| order[model.rng().gen_range(0..order.len())])
                    .collect()
            };
            activate_each(model, &picks, Phase::Step)?;
            finish_step(model.schedule_mut(), 1.0);
        }
        Activation::Staged(staged) => {
            if staged.shuffle {
                shuffle_order(model);
            }
            for stage in staged.stages() {
                let order = model.schedule().order.clone();
                activate_each(model, &order, Phase::Stage(stage))?;
                if staged.shuffle_between_stages {
                    shuffle_order(model);
                }
                model.schedule_mut().time += staged.stage_time();
            }
            finish_step(model.schedule_mut(), 0.0);
        }
    }

    let schedule = model.schedule();
    trace!(
        steps = schedule.steps,
        time = schedule.time,
        agents = schedule.get_agent_count(),
        "schedule step complete"
    );
    Ok(())
}

fn activate_each<M: Model>(model: &mut M, ids: &[AgentId], phase: Phase<'_>) -> Result<(), SimError> {
    for &id in ids {
        // Removed earlier in this step
        let Some(mut agent) = model.schedule_mut().check_out(id) else {
            continue;
        };
        let result = match phase {
            Phase::Step => agent.step(model),
            Phase::Advance => agent.advance(model),
            Phase::Stage(name) => agent.stage(name, model),
        };
        model.schedule_mut().check_in(agent);
        result?;
    }
    Ok(())
}

fn shuffle_order<M: Model>(model: &mut M) {
    let mut order = std::mem::take(&mut model.schedule_mut().order);
    order.shuffle(model.rng());
    model.schedule_mut().order = order;
}

fn finish_step<A>(schedule: &mut Schedule<A>, elapsed: f64) {
    schedule.steps += 1;
    schedule.time += elapsed;
}
