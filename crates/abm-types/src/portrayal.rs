//! Portrayal Types
//!
//! How an agent or network should be drawn by the browser client.

use serde::{Deserialize, Serialize};

use crate::{AgentId, Coord, Point};

/// Shape drawn for a grid agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    /// Circle with radius relative to the cell size.
    Circle { r: f64 },
    /// Rectangle with width and height relative to the cell size.
    Rect { w: f64, h: f64 },
    /// Arrow pointing along `heading` (radians), scaled relative to the cell.
    Arrow { scale: f64, heading: f64 },
}

/// Drawing instructions for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portrayal {
    #[serde(flatten)]
    pub shape: Shape,
    pub color: String,
    pub filled: bool,
    pub layer: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

impl Portrayal {
    pub fn circle(r: f64, color: &str) -> Self {
        Self {
            shape: Shape::Circle { r },
            color: color.to_string(),
            filled: true,
            layer: 0,
            text: None,
            text_color: None,
        }
    }

    pub fn rect(w: f64, h: f64, color: &str) -> Self {
        Self {
            shape: Shape::Rect { w, h },
            color: color.to_string(),
            filled: true,
            layer: 0,
            text: None,
            text_color: None,
        }
    }

    pub fn arrow(scale: f64, heading: f64, color: &str) -> Self {
        Self {
            shape: Shape::Arrow { scale, heading },
            color: color.to_string(),
            filled: true,
            layer: 0,
            text: None,
            text_color: None,
        }
    }

    pub fn on_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    pub fn hollow(mut self) -> Self {
        self.filled = false;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>, color: &str) -> Self {
        self.text = Some(text.into());
        self.text_color = Some(color.to_string());
        self
    }
}

/// A portrayal placed at a grid cell or point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedPortrayal {
    pub agent_id: AgentId,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub portrayal: Portrayal,
}

impl PlacedPortrayal {
    pub fn at_cell(agent_id: AgentId, pos: Coord, portrayal: Portrayal) -> Self {
        Self {
            agent_id,
            x: pos.x as f64,
            y: pos.y as f64,
            portrayal,
        }
    }

    /// Places a portrayal at a continuous position.
    pub fn at_point(agent_id: AgentId, pos: Point, portrayal: Portrayal) -> Self {
        Self {
            agent_id,
            x: pos.x,
            y: pos.y,
            portrayal,
        }
    }
}

/// A node in a network drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePortrayal {
    pub id: usize,
    pub size: f64,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// An edge in a network drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePortrayal {
    pub source: usize,
    pub target: usize,
    pub color: String,
    pub width: f64,
}

/// Complete network drawing for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkPortrayal {
    pub nodes: Vec<NodePortrayal>,
    pub edges: Vec<EdgePortrayal>,
}
