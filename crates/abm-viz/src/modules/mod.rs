//! Built-in visualization elements.

pub mod canvas_grid;
pub mod chart;
pub mod network;
pub mod text;

pub use canvas_grid::{CanvasGrid, PortrayalFn};
pub use chart::ChartModule;
pub use network::NetworkModule;
pub use text::TextElement;
