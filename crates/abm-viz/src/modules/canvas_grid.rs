//! Canvas Grid
//!
//! Draws every placed agent of a grid or continuous space on a canvas,
//! grouped by layer.

use abm_core::{Model, SpatialView};
use abm_types::{ElementDescriptor, PlacedPortrayal, Portrayal};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::element::VisualizationElement;

/// Maps an agent to its drawing; `None` hides it.
pub type PortrayalFn<A> = Box<dyn Fn(&A) -> Option<Portrayal> + Send + Sync>;

/// Canvas drawing of a space.
pub struct CanvasGrid<M: Model, G> {
    portrayal: PortrayalFn<M::Agent>,
    space: fn(&M) -> &G,
    grid_width: usize,
    grid_height: usize,
    canvas_width: u32,
    canvas_height: u32,
}

impl<M: Model, G: SpatialView> CanvasGrid<M, G> {
    /// `space` picks the space out of the model; `grid_width` and
    /// `grid_height` are in cells (or space units), the canvas in pixels.
    pub fn new<F>(
        portrayal: F,
        space: fn(&M) -> &G,
        grid_width: usize,
        grid_height: usize,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Self
    where
        F: Fn(&M::Agent) -> Option<Portrayal> + Send + Sync + 'static,
    {
        Self {
            portrayal: Box::new(portrayal),
            space,
            grid_width,
            grid_height,
            canvas_width,
            canvas_height,
        }
    }

    /// Agents grouped by layer, in space order within a layer.
    pub fn portrayals(&self, model: &M) -> BTreeMap<u32, Vec<PlacedPortrayal>> {
        let mut layers: BTreeMap<u32, Vec<PlacedPortrayal>> = BTreeMap::new();
        for (id, pos) in (self.space)(model).agent_positions() {
            // placed but no longer scheduled
            let Some(agent) = model.schedule().get(id) else {
                continue;
            };
            if let Some(portrayal) = (self.portrayal)(agent) {
                layers
                    .entry(portrayal.layer)
                    .or_default()
                    .push(PlacedPortrayal::at_point(id, pos, portrayal));
            }
        }
        layers
    }
}

impl<M, G> VisualizationElement<M> for CanvasGrid<M, G>
where
    M: Model,
    G: SpatialView,
{
    fn descriptor(&self) -> ElementDescriptor {
        ElementDescriptor::CanvasGrid {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
        }
    }

    fn render(&self, model: &M) -> Value {
        let layers: Map<String, Value> = self
            .portrayals(model)
            .into_iter()
            .map(|(layer, items)| {
                let items = items
                    .into_iter()
                    .filter_map(|item| serde_json::to_value(item).ok())
                    .collect();
                (layer.to_string(), Value::Array(items))
            })
            .collect();
        Value::Object(layers)
    }
}
