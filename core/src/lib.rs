// iopanel Core Library
// Channel model, device event stream client and dashboard widget controllers

pub mod buffer;
pub mod bus;
pub mod channel;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod event;
pub mod gateway;
pub mod sse;
pub mod state_machine;
pub mod widget;

// Export core types
pub use buffer::RollingSampleBuffer;
pub use bus::{
    DeviceEvents, EventBusStats, EventCallback, EventTransport, HttpEventTransport, MemoryTransport,
    SubscriptionId,
};
pub use channel::{ChannelKind, ChannelNum};
pub use config::{ApiFlavor, ClientConfig};
pub use dashboard::{Dashboard, DashboardSnapshot, WidgetSnapshot};
pub use display::{DisplayState, Presentation};
pub use event::{DeviceEvent, EventKind, EventValue};
pub use gateway::{build_gateway, HttpGateway, IoGateway, SingleArrayGateway};
pub use sse::{SseDecoder, SseFrame};
pub use state_machine::{ChannelMachine, ClickAction, Request, Ticket};
pub use widget::{
    AnalogInputWidget, AnalogScale, Attributes, DigitalInputWidget, DigitalOutputWidget,
    TrendGeometry, Widget,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Invalid attribute {name}: {value:?}")]
    InvalidAttribute { name: &'static str, value: String },

    #[error("Degenerate analog range: min={min} max={max}")]
    InvalidScale { min: f64, max: f64 },

    #[error("Unknown channel: {kind} {num}")]
    UnknownChannel { kind: ChannelKind, num: ChannelNum },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Event parse error: {0}")]
    EventParse(String),
}

pub type Result<T> = std::result::Result<T, PanelError>;
