// Client configuration (env-driven defaults)
use serde::{Deserialize, Serialize};

/// Which mock/device API the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// `/api/digital-{input,output}?id=<n>` with `{state}` bodies
    #[default]
    Routed,
    /// `/api/output` array plus `/api/output/:id` with `{value}` bodies
    Single,
}

impl ApiFlavor {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "routed" => Some(ApiFlavor::Routed),
            "single" => Some(ApiFlavor::Single),
            _ => None,
        }
    }
}

/// Configuration for the gateway and the device event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Device or mock server origin, e.g. http://localhost:4000
    pub base_url: String,
    pub api: ApiFlavor,
    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout_ms: Option<u64>,
    /// Delay before reopening a dropped event stream
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("IOPANEL_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:4000".to_string()),
            api: std::env::var("IOPANEL_API")
                .ok()
                .and_then(|v| ApiFlavor::parse(&v))
                .unwrap_or_default(),
            request_timeout_ms: std::env::var("IOPANEL_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok()),
            reconnect_delay_ms: std::env::var("IOPANEL_RECONNECT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(3_000),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn api(mut self, api: ApiFlavor) -> Self {
        self.api = api;
        self
    }

    /// `base_url` joined with an `/api/...` path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn events_url(&self) -> String {
        self.endpoint("/api/events")
    }
}
