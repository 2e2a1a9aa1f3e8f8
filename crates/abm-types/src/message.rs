//! Visualization Wire Messages
//!
//! JSON messages exchanged over the visualization WebSocket. Every message
//! carries a snake_case `type` tag.

use serde::{Deserialize, Serialize};

use crate::{ParamValue, UserParam};

/// One line of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub color: String,
}

impl ChartSeries {
    pub fn new(label: &str, color: &str) -> Self {
        Self {
            label: label.to_string(),
            color: color.to_string(),
        }
    }
}

/// Static layout of a visualization element, sent once per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementDescriptor {
    CanvasGrid {
        grid_width: usize,
        grid_height: usize,
        canvas_width: u32,
        canvas_height: u32,
    },
    Chart {
        series: Vec<ChartSeries>,
        canvas_width: u32,
        canvas_height: u32,
    },
    Text,
    Network {
        canvas_width: u32,
        canvas_height: u32,
    },
}

/// Messages sent by the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Advance the model until it has completed `step` steps.
    GetStep { step: u64 },
    /// Rebuild the model from the current parameters.
    Reset,
    /// Change a parameter; takes effect on the next reset.
    SubmitParams { param: String, value: ParamValue },
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ModelParams { params: Vec<UserParam> },
    Elements { elements: Vec<ElementDescriptor> },
    VizState { step: u64, data: Vec<serde_json::Value> },
    End,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"get_step","step":3}"#).unwrap();
        assert_eq!(msg, ClientMessage::GetStep { step: 3 });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Reset);

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"submit_params","param":"density","value":0.7}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitParams {
                param: "density".to_string(),
                value: ParamValue::Float(0.7),
            }
        );
    }

    #[test]
    fn test_server_message_serialization() {
        let json = serde_json::to_string(&ServerMessage::End).unwrap();
        assert_eq!(json, r#"{"type":"end"}"#);

        let state = ServerMessage::VizState {
            step: 2,
            data: vec![serde_json::json!("hello")],
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"type":"viz_state","step":2,"data":["hello"]}"#);
    }

    #[test]
    fn test_descriptor_serialization() {
        let desc = ElementDescriptor::Chart {
            series: vec![ChartSeries::new("gini", "black")],
            canvas_width: 500,
            canvas_height: 200,
        };
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value["kind"], "chart");
        assert_eq!(value["series"][0]["label"], "gini");
    }
}
