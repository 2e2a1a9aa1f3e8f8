//! Spaces
//!
//! Spatial components a model can place its agents in:
//!
//! - [`SingleGrid`]: discrete grid, at most one agent per cell
//! - [`MultiGrid`]: discrete grid, any number of agents per cell
//! - [`ContinuousSpace`]: agents are points, with a grid index for lookups
//! - [`NetworkGrid`]: agents sit on the nodes of a [`Graph`]
//!
//! Spaces track agent positions by [`AgentId`]; they never own agents.

pub mod continuous;
pub mod grid;
pub mod network;

pub use continuous::ContinuousSpace;
pub use grid::{CellContents, Grid, GridShape, MultiCell, MultiGrid, SingleCell, SingleGrid};
pub use network::{Graph, NetworkGrid};

use abm_types::{AgentId, Coord, Point};

/// Errors raised by spaces.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error("cell {0} is off the grid")]
    OutOfBounds(Coord),
    #[error("point {0} is out of bounds and the space is not toroidal")]
    PointOutOfBounds(Point),
    #[error("cell {0} is not empty")]
    CellNotEmpty(Coord),
    #[error("agent {0} is already placed")]
    AlreadyPlaced(AgentId),
    #[error("agent {0} is not placed")]
    NotPlaced(AgentId),
    #[error("no empty cells")]
    NoEmptyCells,
    #[error("grid is full")]
    GridFull,
    #[error("node {0} does not exist")]
    InvalidNode(usize),
    #[error("self loop on node {0}")]
    SelfLoop(usize),
}

/// Which cells count as neighbors on a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// All surrounding cells, including diagonals.
    Moore,
    /// Only up, down, left and right.
    VonNeumann,
}

/// Read-only view of where agents are, in drawing units.
///
/// Grids report cell coordinates; continuous spaces report positions
/// relative to their minimum corner.
pub trait SpatialView {
    fn view_width(&self) -> usize;
    fn view_height(&self) -> usize;
    fn agent_positions(&self) -> Vec<(AgentId, Point)>;
}
