//! Modular visualization server.
//!
//! [`ModularServer`] serves a browser page built from visualization
//! elements, plus a WebSocket that steps a model and streams rendered
//! state back to the page.

use std::net::SocketAddr;
use std::sync::Arc;

use abm_core::{FromParams, Model, SimError};
use abm_types::{Params, UserParam};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::element::{describe_all, Elements};
use crate::state::{ModelBuilder, ServerState};
use crate::ws;

const INDEX_HTML: &str = include_str!("../static/index.html");
const APP_JS: &str = include_str!("../static/app.js");

/// Address the server binds to.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `127.0.0.1`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 8521,
        }
    }
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Browser front end for one model type.
pub struct ModularServer<M> {
    title: String,
    elements: Elements<M>,
    builder: ModelBuilder<M>,
    user_params: Vec<UserParam>,
    base_params: Params,
    config: ServerConfig,
}

impl<M> ModularServer<M>
where
    M: Model + Send + 'static,
{
    /// A server whose models come from `factory`.
    pub fn new<F>(title: impl Into<String>, elements: Elements<M>, factory: F) -> Self
    where
        F: Fn(&Params, Option<u64>) -> Result<M, SimError> + Send + Sync + 'static,
    {
        Self {
            title: title.into(),
            elements,
            builder: Arc::new(factory),
            user_params: Vec::new(),
            base_params: Params::new(),
            config: ServerConfig::default(),
        }
    }

    /// A server for a model with default parameters.
    pub fn for_model(title: impl Into<String>, elements: Elements<M>) -> Self
    where
        M: FromParams,
    {
        let mut server = Self::new(title, elements, M::from_params);
        server.base_params = M::default_params();
        server
    }

    /// Parameter controls shown in the browser. Their defaults override the
    /// model defaults.
    pub fn user_params(mut self, controls: Vec<UserParam>) -> Self {
        self.user_params = controls;
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Parameters every new connection starts from.
    pub fn initial_params(&self) -> Params {
        let mut params = self.base_params.clone();
        params.merge(&UserParam::defaults(&self.user_params));
        params
    }

    /// Builds the router without binding a socket.
    ///
    /// - `GET /` -- browser client
    /// - `GET /static/app.js` -- client script
    /// - `GET /api/elements` -- element layout and parameter controls
    /// - `GET /ws` -- model session
    pub fn router(self) -> Router {
        let params = self.initial_params();
        let state = Arc::new(ServerState {
            title: self.title,
            elements: self.elements,
            builder: self.builder,
            user_params: self.user_params,
            params,
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(index::<M>))
            .route("/static/app.js", get(app_js))
            .route("/api/elements", get(elements::<M>))
            .route("/ws", get(ws::ws_session::<M>))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Binds the configured address and serves until the process ends.
    pub async fn launch(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

        let title = self.title.clone();
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

        info!(%addr, %title, "Visualization server listening at http://{addr}");

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

        Ok(())
    }
}

async fn index<M>(State(state): State<Arc<ServerState<M>>>) -> Html<String>
where
    M: Model + Send + 'static,
{
    Html(INDEX_HTML.replace("{{title}}", &escape_html(&state.title)))
}

async fn app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], APP_JS)
}

async fn elements<M>(State(state): State<Arc<ServerState<M>>>) -> Json<Value>
where
    M: Model + Send + 'static,
{
    Json(json!({
        "title": state.title,
        "elements": describe_all(&state.elements),
        "params": state.user_params,
    }))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
