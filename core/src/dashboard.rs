// Dashboard page controller
//
// Owns the widgets of one page together with the gateway and event bus they share.
use crate::bus::DeviceEvents;
use crate::channel::{ChannelKind, ChannelNum};
use crate::config::ClientConfig;
use crate::display::DisplayState;
use crate::gateway::{build_gateway, IoGateway};
use crate::state_machine::ClickAction;
use crate::widget::{Attributes, Widget};
use crate::{PanelError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Rendered view of one widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    pub kind: ChannelKind,
    pub num: ChannelNum,
    pub name: Option<String>,
    /// Display state of digital widgets
    pub state: Option<DisplayState>,
    /// Trend path and last raw value of analog widgets
    pub trend: Option<String>,
    pub latest: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub taken_at: DateTime<Utc>,
    pub widgets: Vec<WidgetSnapshot>,
}

pub struct Dashboard {
    gateway: Arc<dyn IoGateway>,
    events: Arc<DeviceEvents>,
    widgets: Vec<Widget>,
}

impl Dashboard {
    pub fn new(gateway: Arc<dyn IoGateway>, events: Arc<DeviceEvents>) -> Self {
        Self {
            gateway,
            events,
            widgets: Vec::new(),
        }
    }

    /// Gateway and event stream for `cfg`
    pub fn connect(cfg: &ClientConfig) -> Result<Self> {
        let gateway = build_gateway(cfg)?;
        let events = DeviceEvents::connect_http(cfg)?;
        info!(target: "widget", base_url = %cfg.base_url, api = ?cfg.api, "Dashboard connected");
        Ok(Self::new(gateway, events))
    }

    /// Create a widget; fails on missing or malformed attributes
    pub fn add(&mut self, kind: ChannelKind, attributes: &Attributes) -> Result<&Widget> {
        let widget = Widget::create(kind, attributes, Arc::clone(&self.gateway), &self.events)?;
        self.widgets.push(widget);
        let index = self.widgets.len() - 1;
        Ok(&self.widgets[index])
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn events(&self) -> &Arc<DeviceEvents> {
        &self.events
    }

    /// Issue the initial load of every widget
    pub async fn attach_all(&self) {
        for widget in &self.widgets {
            widget.attach().await;
        }
    }

    /// Click the digital output widget configured with `num`
    pub async fn click_output(&self, num: ChannelNum) -> Result<ClickAction> {
        let widget = self
            .widgets
            .iter()
            .find_map(|w| match w {
                Widget::DigitalOutput(o) if o.num() == num => Some(o),
                _ => None,
            })
            .ok_or(PanelError::UnknownChannel {
                kind: ChannelKind::DigitalOutput,
                num,
            })?;
        Ok(widget.click().await)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let widgets = self
            .widgets
            .iter()
            .map(|w| {
                let (trend, latest) = match w {
                    Widget::AnalogInput(a) => (Some(a.trend_path()), a.latest()),
                    _ => (None, None),
                };
                WidgetSnapshot {
                    kind: w.kind(),
                    num: w.num(),
                    name: w.name().map(str::to_string),
                    state: w.state(),
                    trend,
                    latest,
                }
            })
            .collect();
        DashboardSnapshot {
            taken_at: Utc::now(),
            widgets,
        }
    }

    pub fn dispose_all(&self) {
        for widget in &self.widgets {
            widget.dispose();
        }
    }
}
