//! Agents
//!
//! The behavior contract every agent implements. An agent is written for
//! one model type and receives that model mutably when it acts.

use abm_types::AgentId;

use crate::error::SimError;
use crate::time::ScheduleError;

/// An autonomous actor activated by a [`Schedule`](crate::time::Schedule).
///
/// While an agent is being activated it is checked out of the schedule, so
/// it can freely read and mutate the rest of the model (spaces, other
/// agents, the RNG) through `model`.
pub trait Agent: Sized {
    /// The model this agent lives in.
    type Model;

    /// Identifier, unique within the model.
    fn unique_id(&self) -> AgentId;

    /// Act for one step.
    fn step(&mut self, model: &mut Self::Model) -> Result<(), SimError>;

    /// Apply changes staged by `step`. Called after every agent has stepped
    /// under simultaneous activation.
    fn advance(&mut self, _model: &mut Self::Model) -> Result<(), SimError> {
        Ok(())
    }

    /// Run a named stage under staged activation.
    ///
    /// The default understands `"step"` and `"advance"`; agents override this
    /// to provide further stages.
    fn stage(&mut self, stage: &str, model: &mut Self::Model) -> Result<(), SimError> {
        match stage {
            "step" => self.step(model),
            "advance" => self.advance(model),
            other => Err(ScheduleError::UnknownStage {
                stage: other.to_string(),
                agent: self.unique_id(),
            }
            .into()),
        }
    }
}
