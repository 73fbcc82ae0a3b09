//! Local control API for voxchat.
//!
//! Stands in for the page buttons and selectors:
//! - Recording control (start, stop, toggle, status)
//! - Form fields (emotion, voice id, prompt template)

pub mod error;
pub mod routes;

use crate::client::FieldsHandle;
use crate::session::StatusHandle;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tracing::info;

pub use routes::recording::{ApiCommand, RecordingAction, RecordingState};

pub struct ApiServer {
    port: u16,
    recording_state: RecordingState,
    fields: FieldsHandle,
}

impl ApiServer {
    pub fn new(
        tx: mpsc::Sender<ApiCommand>,
        status: StatusHandle,
        fields: FieldsHandle,
        port: u16,
    ) -> Self {
        Self {
            port,
            recording_state: RecordingState { tx, status },
            fields,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::recording::router(self.recording_state.clone()))
            .nest("/fields", routes::fields::router(self.fields.clone()))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /        - Service info");
        info!("  POST /start   - Start recording");
        info!("  POST /stop    - Stop recording and send");
        info!("  POST /toggle  - Toggle recording");
        info!("  GET  /status  - Session status");
        info!("  GET  /fields  - Current emotion, voice id, prompt template");
        info!("  PUT  /fields  - Update any of them");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "voxchat",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "voxchat"
    }))
}
