//! Shared data types for the agent-based modeling workspace.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod ids;
pub mod message;
pub mod params;
pub mod portrayal;

// Re-export identifier and position types
pub use ids::{AgentId, Coord, Point};

// Re-export parameter types
pub use params::{ParamError, ParamValue, Params, UserParam};

// Re-export portrayal types
pub use portrayal::{
    EdgePortrayal, NetworkPortrayal, NodePortrayal, PlacedPortrayal, Portrayal, Shape,
};

// Re-export wire messages
pub use message::{ChartSeries, ClientMessage, ElementDescriptor, ServerMessage};
