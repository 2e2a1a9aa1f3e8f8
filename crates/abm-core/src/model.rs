//! Models
//!
//! A model owns its agents (through a schedule), its spaces and one seeded
//! random number generator. [`ModelCore`] carries the bookkeeping every model
//! shares; the [`Model`] trait wires it to the schedule.

use abm_types::{AgentId, Params};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::agent::Agent;
use crate::error::SimError;
use crate::time::{self, Schedule};

/// Shared model state: running flag, seeded RNG and agent id counter.
#[derive(Debug, Clone)]
pub struct ModelCore {
    /// Cleared to stop `run_model`.
    pub running: bool,
    seed: u64,
    rng: SmallRng,
    next_id: u64,
}

impl ModelCore {
    /// Creates the core. Without a seed one is drawn and recorded so the run
    /// can be reproduced.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            running: true,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Reseeds the generator. `None` draws a fresh seed.
    pub fn reset_randomizer(&mut self, seed: Option<u64>) {
        self.seed = seed.unwrap_or_else(rand::random);
        self.rng = SmallRng::seed_from_u64(self.seed);
    }

    /// Hands out the next unused agent id.
    pub fn next_id(&mut self) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Default for ModelCore {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A simulation model.
pub trait Model: Sized {
    type Agent: Agent<Model = Self>;

    fn core(&self) -> &ModelCore;
    fn core_mut(&mut self) -> &mut ModelCore;
    fn schedule(&self) -> &Schedule<Self::Agent>;
    fn schedule_mut(&mut self) -> &mut Schedule<Self::Agent>;

    /// Advances the model by one step. The default activates the schedule
    /// once; models override it to collect data or check stop conditions.
    fn step(&mut self) -> Result<(), SimError> {
        time::activate(self)
    }

    fn running(&self) -> bool {
        self.core().running
    }

    /// Stops `run_model` after the current step.
    fn stop(&mut self) {
        self.core_mut().running = false;
    }

    fn rng(&mut self) -> &mut SmallRng {
        self.core_mut().rng()
    }

    fn next_id(&mut self) -> AgentId {
        self.core_mut().next_id()
    }

    /// Steps until the model stops running. Returns the steps taken.
    fn run_model(&mut self) -> Result<u64, SimError> {
        let mut taken = 0;
        while self.running() {
            self.step()?;
            taken += 1;
        }
        Ok(taken)
    }

    /// Steps at most `max_steps` times, stopping early when the model stops
    /// running. Returns the steps taken.
    fn run_for(&mut self, max_steps: u64) -> Result<u64, SimError> {
        let mut taken = 0;
        while taken < max_steps && self.running() {
            self.step()?;
            taken += 1;
        }
        Ok(taken)
    }
}

/// Models that can be built from a parameter set, as the batch runner, the
/// CLI and the visualization server do.
pub trait FromParams: Model {
    fn from_params(params: &Params, seed: Option<u64>) -> Result<Self, SimError>;

    /// Parameters used when none are supplied.
    fn default_params() -> Params;
}
