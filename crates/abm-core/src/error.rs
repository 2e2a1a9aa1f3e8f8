//! Error Types
//!
//! The umbrella error returned by agent steps, model steps and batch runs.
//! Module errors convert into it so agent code can use `?` on space and
//! schedule calls.

use abm_types::ParamError;

use crate::datacollection::CollectorError;
use crate::space::SpaceError;
use crate::time::ScheduleError;

/// Errors raised while building or running a model.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("space error: {0}")]
    Space(#[from] SpaceError),
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),
    #[error("data collection error: {0}")]
    Collector(#[from] CollectorError),
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),
    #[error("model error: {0}")]
    Model(String),
}

impl SimError {
    /// Creates a model-specific error.
    pub fn model(message: impl Into<String>) -> Self {
        SimError::Model(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abm_types::{AgentId, Coord};

    #[test]
    fn test_space_error_converts() {
        fn place() -> Result<(), SimError> {
            Err(SpaceError::CellNotEmpty(Coord::new(1, 2)))?;
            Ok(())
        }
        let err = place().unwrap_err();
        assert!(matches!(err, SimError::Space(SpaceError::CellNotEmpty(_))));
        assert_eq!(err.to_string(), "space error: cell (1, 2) is not empty");
    }

    #[test]
    fn test_schedule_error_message() {
        let err: SimError = ScheduleError::DuplicateAgent(AgentId(4)).into();
        assert_eq!(err.to_string(), "schedule error: agent 4 is already scheduled");
    }
}
