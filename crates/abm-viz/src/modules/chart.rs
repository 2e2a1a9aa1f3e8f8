//! Chart Module
//!
//! Line chart of model reporters read from the model's data collector.

use abm_core::{DataCollector, Model};
use abm_types::{ChartSeries, ElementDescriptor};
use serde_json::{json, Value};

use crate::element::VisualizationElement;

/// Plots the latest value of each series after every step. Series labels
/// name model reporters of the collector.
pub struct ChartModule<M: Model> {
    series: Vec<ChartSeries>,
    collector: fn(&M) -> &DataCollector<M>,
    canvas_width: u32,
    canvas_height: u32,
}

impl<M: Model> ChartModule<M> {
    pub fn new(series: Vec<ChartSeries>, collector: fn(&M) -> &DataCollector<M>) -> Self {
        Self {
            series,
            collector,
            canvas_width: 500,
            canvas_height: 200,
        }
    }

    pub fn with_size(mut self, canvas_width: u32, canvas_height: u32) -> Self {
        self.canvas_width = canvas_width;
        self.canvas_height = canvas_height;
        self
    }
}

impl<M: Model> VisualizationElement<M> for ChartModule<M> {
    fn descriptor(&self) -> ElementDescriptor {
        ElementDescriptor::Chart {
            series: self.series.clone(),
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
        }
    }

    fn render(&self, model: &M) -> Value {
        let collector = (self.collector)(model);
        Value::Array(
            self.series
                .iter()
                .map(|series| {
                    json!({
                        "label": series.label,
                        "value": collector.latest(&series.label).cloned().unwrap_or(Value::Null),
                    })
                })
                .collect(),
        )
    }
}
