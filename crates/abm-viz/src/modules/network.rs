//! Network Module
//!
//! Node-link drawing of a model's network.

use abm_types::{ElementDescriptor, NetworkPortrayal};
use serde_json::Value;
use tracing::warn;

use crate::element::VisualizationElement;

/// Draws the [`NetworkPortrayal`] a model function produces.
pub struct NetworkModule<M> {
    portrayal: Box<dyn Fn(&M) -> NetworkPortrayal + Send + Sync>,
    canvas_width: u32,
    canvas_height: u32,
}

impl<M> NetworkModule<M> {
    pub fn new<F>(portrayal: F, canvas_width: u32, canvas_height: u32) -> Self
    where
        F: Fn(&M) -> NetworkPortrayal + Send + Sync + 'static,
    {
        Self {
            portrayal: Box::new(portrayal),
            canvas_width,
            canvas_height,
        }
    }
}

impl<M> VisualizationElement<M> for NetworkModule<M> {
    fn descriptor(&self) -> ElementDescriptor {
        ElementDescriptor::Network {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
        }
    }

    fn render(&self, model: &M) -> Value {
        match serde_json::to_value((self.portrayal)(model)) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize network portrayal: {e}");
                Value::Null
            }
        }
    }
}
