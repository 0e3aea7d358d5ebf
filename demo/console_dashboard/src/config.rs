use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use iopanel_core::{ApiFlavor, Attributes, ChannelKind, ClientConfig};

/// One widget on the page: its kind plus the attributes it is created from
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetSpec {
    pub kind: ChannelKind,
    pub attributes: Attributes,
}

impl WidgetSpec {
    fn new(kind: ChannelKind, attributes: Attributes) -> Self {
        Self { kind, attributes }
    }
}

/// Console dashboard configuration
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub client: ClientConfig,
    pub widgets: Vec<WidgetSpec>,
    /// Print a full snapshot this often; 0 disables it
    pub snapshot_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            widgets: default_page(),
            snapshot_interval_ms: std::env::var("IOPANEL_SNAPSHOT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0),
        }
    }
}

/// 4 digital outputs, 4 digital inputs, one analog trend on channel 0
fn default_page() -> Vec<WidgetSpec> {
    let mut page = Vec::new();
    for num in 0..4 {
        page.push(WidgetSpec::new(
            ChannelKind::DigitalOutput,
            Attributes::new()
                .with("num", num)
                .with("name", format!("Output {}", num)),
        ));
    }
    for num in 0..4 {
        page.push(WidgetSpec::new(
            ChannelKind::DigitalInput,
            Attributes::new()
                .with("num", num)
                .with("name", format!("Input {}", num)),
        ));
    }
    page.push(WidgetSpec::new(
        ChannelKind::AnalogInput,
        Attributes::new()
            .with("num", 0)
            .with("min", 0)
            .with("max", 100)
            .with("name", "Analog 0"),
    ));
    page
}

impl DashboardConfig {
    /// Load from IOPANEL_DASHBOARD_CONFIG or ./dashboard.toml, overlaid on env-driven defaults
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("IOPANEL_DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "console_dashboard", path = %path, "No TOML config found; using default page");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::parse(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "console_dashboard", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "console_dashboard", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn parse(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        Ok(toml::from_str::<DashboardToml>(s)?.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DashboardToml {
    pub client: Option<ClientToml>,
    pub snapshot_interval_ms: Option<u64>,
    #[serde(default, rename = "widget")]
    pub widgets: Vec<WidgetToml>,
}

impl DashboardToml {
    fn overlay(self, mut base: DashboardConfig) -> DashboardConfig {
        if let Some(c) = self.client {
            c.apply(&mut base.client);
        }
        if let Some(ms) = self.snapshot_interval_ms {
            base.snapshot_interval_ms = ms;
        }
        // A page in the file replaces the built-in page entirely
        if !self.widgets.is_empty() {
            base.widgets = self.widgets.into_iter().map(WidgetToml::into_spec).collect();
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ClientToml {
    pub base_url: Option<String>,
    pub api: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
}

impl ClientToml {
    fn apply(self, c: &mut ClientConfig) {
        if let Some(x) = self.base_url {
            c.base_url = x;
        }
        if let Some(x) = self.api.as_deref().and_then(ApiFlavor::parse) {
            c.api = x;
        }
        if let Some(x) = self.request_timeout_ms {
            c.request_timeout_ms = Some(x);
        }
        if let Some(x) = self.reconnect_delay_ms {
            c.reconnect_delay_ms = x;
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct WidgetToml {
    pub kind: ChannelKind,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, toml::Value>,
}

impl WidgetToml {
    fn into_spec(self) -> WidgetSpec {
        let attributes = self
            .attributes
            .into_iter()
            .map(|(k, v)| match v {
                toml::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect::<Attributes>();
        WidgetSpec::new(self.kind, attributes)
    }
}
