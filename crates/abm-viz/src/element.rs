//! Visualization Elements
//!
//! An element describes its static layout once per connection and renders
//! a JSON payload for the browser after every step.

use abm_types::ElementDescriptor;
use serde_json::Value;

/// A piece of the browser page driven by model state.
pub trait VisualizationElement<M>: Send + Sync {
    /// Layout sent when a client connects.
    fn descriptor(&self) -> ElementDescriptor;

    /// Data for the current model state.
    fn render(&self, model: &M) -> Value;
}

/// Elements of one page, in display order.
pub type Elements<M> = Vec<Box<dyn VisualizationElement<M>>>;

/// Renders every element in order.
pub fn render_all<M>(elements: &[Box<dyn VisualizationElement<M>>], model: &M) -> Vec<Value> {
    elements.iter().map(|element| element.render(model)).collect()
}

/// Descriptors of every element in order.
pub fn describe_all<M>(elements: &[Box<dyn VisualizationElement<M>>]) -> Vec<ElementDescriptor> {
    elements.iter().map(|element| element.descriptor()).collect()
}
