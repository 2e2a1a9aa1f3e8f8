//! Text Element

use abm_types::ElementDescriptor;
use serde_json::Value;

use crate::element::VisualizationElement;

/// A line of text computed from the model.
pub struct TextElement<M> {
    text: Box<dyn Fn(&M) -> String + Send + Sync>,
}

impl<M> TextElement<M> {
    pub fn new<F>(text: F) -> Self
    where
        F: Fn(&M) -> String + Send + Sync + 'static,
    {
        Self {
            text: Box::new(text),
        }
    }
}

impl<M> VisualizationElement<M> for TextElement<M> {
    fn descriptor(&self) -> ElementDescriptor {
        ElementDescriptor::Text
    }

    fn render(&self, model: &M) -> Value {
        Value::String((self.text)(model))
    }
}
