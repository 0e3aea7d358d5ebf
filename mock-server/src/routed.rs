// Routed API: `/api/digital-{input,output}?id=<n>` with `{ "state": bool }` bodies
use crate::bank::{parse_flag, parse_id};
use crate::broadcast::SseMessage;
use crate::server::MockState;
use crate::{MockError, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use iopanel_core::channel::StateBody;
use iopanel_core::event::SamplePayload;
use iopanel_core::ChannelKind;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

impl IdQuery {
    fn resolve(&self, len: usize) -> Result<usize> {
        parse_id(self.id.as_deref().unwrap_or_default(), len)
    }
}

pub fn routes() -> Router<MockState> {
    Router::new()
        .route("/api/digital-output", get(read_output).post(write_output))
        .route("/api/digital-input", get(read_input).post(write_input))
}

async fn read_output(
    State(state): State<MockState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<StateBody>> {
    let id = query.resolve(state.bank.output_count())?;
    Ok(Json(StateBody {
        state: state.bank.output(id)?,
    }))
}

/// Commit, then announce `digital-output` to every SSE client
async fn write_output(
    State(state): State<MockState>,
    Query(query): Query<IdQuery>,
    body: Bytes,
) -> Result<Json<StateBody>> {
    let kind = ChannelKind::DigitalOutput;
    let id = query
        .resolve(state.bank.output_count())
        .map_err(|e| rejected(e, kind, &query))?;
    let value = parse_flag(&body, "state").map_err(|e| rejected(e, kind, &query))?;

    let announce = SseMessage::json(
        kind.as_str(),
        &SamplePayload {
            num: id as u32,
            value,
        },
    )?;
    let state = state.bank.set_output(id, value, Some(announce))?;
    Ok(Json(StateBody { state }))
}

async fn read_input(
    State(state): State<MockState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<StateBody>> {
    let id = query.resolve(state.bank.input_count())?;
    Ok(Json(StateBody {
        state: state.bank.input(id)?,
    }))
}

/// Inputs are driven by the simulator; a manual write is committed but not announced
async fn write_input(
    State(state): State<MockState>,
    Query(query): Query<IdQuery>,
    body: Bytes,
) -> Result<Json<StateBody>> {
    let kind = ChannelKind::DigitalInput;
    let id = query
        .resolve(state.bank.input_count())
        .map_err(|e| rejected(e, kind, &query))?;
    let value = parse_flag(&body, "state").map_err(|e| rejected(e, kind, &query))?;
    let state = state.bank.set_input(id, value, None)?;
    Ok(Json(StateBody { state }))
}

fn rejected(error: MockError, kind: ChannelKind, query: &IdQuery) -> MockError {
    warn!(
        target: "mock_api",
        kind = %kind,
        id = ?query.id,
        error = %error,
        "Write rejected"
    );
    error
}
