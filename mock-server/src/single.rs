// Single-array API: `GET /api/output`, `POST /api/output/:id` with `{ "value": bool }`
use crate::bank::{parse_flag, parse_id};
use crate::broadcast::SseMessage;
use crate::server::MockState;
use crate::{MockError, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use iopanel_core::event::{OutputChange, OutputEnvelope};
use iopanel_core::EventKind;
use tracing::warn;

pub fn routes() -> Router<MockState> {
    Router::new()
        .route("/api/output", get(list_outputs))
        .route("/api/output/:id", post(set_output))
}

async fn list_outputs(State(state): State<MockState>) -> Json<Vec<bool>> {
    Json(state.bank.outputs())
}

async fn set_output(
    State(state): State<MockState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<&'static str> {
    let bank = &state.bank;
    // Id first, then value
    let id = parse_id(&raw_id, bank.output_count()).map_err(|e| rejected(e, &raw_id))?;
    let value = parse_flag(&body, "value").map_err(|e| rejected(e, &raw_id))?;

    let announce = SseMessage::json(
        EventKind::Output.as_str(),
        &OutputEnvelope::new(OutputChange {
            id: id as u32,
            value,
        }),
    )?;
    bank.set_output(id, value, Some(announce))?;
    Ok("success")
}

fn rejected(error: MockError, raw_id: &str) -> MockError {
    warn!(target: "mock_api", id = raw_id, error = %error, "Output write rejected");
    error
}
