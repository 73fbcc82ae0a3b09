//! Form field endpoints (emotion, voice id, prompt template).

use crate::client::{FieldsHandle, FieldsUpdate, VoiceFields};
use axum::{extract::State, response::Json, routing::get, Router};
use tracing::{info, warn};

pub fn router(fields: FieldsHandle) -> Router {
    Router::new()
        .route("/", get(get_fields).put(update_fields))
        .with_state(fields)
}

async fn get_fields(State(fields): State<FieldsHandle>) -> Json<VoiceFields> {
    Json(fields.get().await)
}

/// Applies a partial update; omitted fields keep their current value.
async fn update_fields(
    State(fields): State<FieldsHandle>,
    Json(update): Json<FieldsUpdate>,
) -> Json<VoiceFields> {
    let updated = fields.update(update).await;
    if !updated.has_known_template() {
        warn!(
            "Prompt template {:?} is unknown to the server",
            updated.prompt_template
        );
    }
    info!(
        "Fields updated: voice={:?} emotion={:?} template={:?}",
        updated.voice_id, updated.emotion, updated.prompt_template
    );
    Json(updated)
}
