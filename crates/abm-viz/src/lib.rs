//! Browser visualization for agent-based models.
//!
//! Models are shown through [`VisualizationElement`]s (canvas grids, charts,
//! text, networks) served by a [`ModularServer`]. Each browser connection
//! drives its own model over a WebSocket.

pub mod element;
pub mod modules;
pub mod server;
pub mod state;
pub mod ws;

pub use element::{Elements, VisualizationElement};
pub use modules::{CanvasGrid, ChartModule, NetworkModule, TextElement};
pub use server::{ModularServer, ServerConfig, ServerError};
pub use state::{ServerState, Session, MAX_STEPS_PER_REQUEST};
