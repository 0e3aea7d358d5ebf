// iopanel mock device API
//
// Two router variants over one channel bank: "single" (one output array, `output` events)
// and "routed" (per-kind endpoints, simulated inputs, `digital-*`/`analog-input` events).

pub mod bank;
pub mod broadcast;
pub mod config;
pub mod routed;
pub mod server;
pub mod simulator;
pub mod single;

pub use bank::ChannelBank;
pub use broadcast::{EventBroadcaster, SseMessage};
pub use config::{MockConfig, MockVariant};
pub use server::{MockServer, MockState, RunningServer};
pub use simulator::{InputSimulator, SineGenerator};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(thiserror::Error, Debug)]
pub enum MockError {
    #[error("invalid id")]
    InvalidId,
    #[error("invalid value")]
    InvalidValue,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MockError>;

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
