//! Server and connection state.
//!
//! [`ServerState`] is shared by every request. Each WebSocket connection
//! gets its own [`Session`] holding an independent model instance, so
//! browser tabs never interfere with each other.

use abm_core::{Model, SimError};
use abm_types::{ClientMessage, ParamValue, Params, ServerMessage, UserParam};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::element::{describe_all, render_all, Elements};

/// Most model steps one `get_step` request may run. Larger targets are
/// answered with the state reached so far; the client asks again.
pub const MAX_STEPS_PER_REQUEST: u64 = 1_000;

/// Builds a model from parameters. `None` seeds from entropy.
pub type ModelBuilder<M> = Arc<dyn Fn(&Params, Option<u64>) -> Result<M, SimError> + Send + Sync>;

/// State shared across all requests.
pub struct ServerState<M> {
    pub title: String,
    pub elements: Elements<M>,
    pub builder: ModelBuilder<M>,
    pub user_params: Vec<UserParam>,
    /// Starting parameters for every new connection
    pub params: Params,
}

impl<M: Model> ServerState<M> {
    /// Messages sent to a client right after it connects.
    pub fn greeting(&self) -> Vec<ServerMessage> {
        vec![
            ServerMessage::ModelParams {
                params: self.user_params.clone(),
            },
            ServerMessage::Elements {
                elements: describe_all(&self.elements),
            },
        ]
    }

    /// Whether a client may change a parameter.
    pub fn accepts_param(&self, name: &str) -> bool {
        self.params.contains(name) || self.user_params.iter().any(|p| p.name() == Some(name))
    }
}

/// One browser connection and its model.
pub struct Session<M> {
    id: Uuid,
    state: Arc<ServerState<M>>,
    params: Params,
    model: Option<M>,
    steps: u64,
}

impl<M: Model> Session<M> {
    /// Opens a session and builds its first model.
    pub fn open(state: Arc<ServerState<M>>) -> (Self, Vec<ServerMessage>) {
        let mut session = Self {
            id: Uuid::new_v4(),
            params: state.params.clone(),
            state,
            model: None,
            steps: 0,
        };
        info!(session = %session.id, "visualization session opened");

        let mut replies = session.state.greeting();
        replies.extend(session.reset());
        (session, replies)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    /// Steps taken since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Applies one client message and returns the replies.
    pub fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::GetStep { step } => self.advance_to(step),
            ClientMessage::Reset => self.reset(),
            ClientMessage::SubmitParams { param, value } => self.submit_param(param, value),
        }
    }

    /// Parses and applies a raw text frame. Unparseable frames get an error
    /// reply.
    pub fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message),
            Err(e) => {
                debug!(session = %self.id, error = %e, "unparseable client message");
                vec![ServerMessage::Error {
                    message: format!("invalid message: {e}"),
                }]
            }
        }
    }

    fn reset(&mut self) -> Vec<ServerMessage> {
        self.steps = 0;
        match (self.state.builder)(&self.params, None) {
            Ok(model) => {
                debug!(session = %self.id, seed = model.core().seed(), "model reset");
                self.model = Some(model);
                self.viz_state()
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "failed to build model");
                self.model = None;
                vec![ServerMessage::Error {
                    message: format!("failed to build model: {e}"),
                }]
            }
        }
    }

    fn advance_to(&mut self, target: u64) -> Vec<ServerMessage> {
        let Some(model) = self.model.as_mut() else {
            return vec![ServerMessage::Error {
                message: "no model; reset with valid parameters".to_string(),
            }];
        };
        let target = target.min(self.steps.saturating_add(MAX_STEPS_PER_REQUEST));
        while self.steps < target && model.running() {
            if let Err(e) = model.step() {
                warn!(session = %self.id, step = self.steps, error = %e, "model step failed");
                return vec![ServerMessage::Error {
                    message: format!("step failed: {e}"),
                }];
            }
            self.steps += 1;
        }
        self.viz_state()
    }

    fn submit_param(&mut self, param: String, value: ParamValue) -> Vec<ServerMessage> {
        if !self.state.accepts_param(&param) {
            return vec![ServerMessage::Error {
                message: format!("unknown parameter '{param}'"),
            }];
        }
        debug!(session = %self.id, %param, %value, "parameter submitted");
        self.params.set(param, value);
        Vec::new()
    }

    fn viz_state(&self) -> Vec<ServerMessage> {
        let Some(model) = self.model.as_ref() else {
            return Vec::new();
        };
        let mut replies = vec![ServerMessage::VizState {
            step: self.steps,
            data: render_all(&self.state.elements, model),
        }];
        if !model.running() {
            replies.push(ServerMessage::End);
        }
        replies
    }
}

impl<M> Drop for Session<M> {
    fn drop(&mut self) {
        info!(session = %self.id, "visualization session closed");
    }
}
