//! Widget controllers.
//!
//! A widget is created from its configuration attributes (`num`, `min`, `max`,
//! `name`, ...), subscribes to the device event bus, and is explicitly attached
//! and disposed. Missing or malformed required attributes fail creation.

mod analog;
mod digital;

pub use analog::{AnalogInputWidget, AnalogScale, TrendGeometry};
pub use digital::{DigitalInputWidget, DigitalOutputWidget};

use crate::bus::DeviceEvents;
use crate::channel::{ChannelKind, ChannelNum};
use crate::display::DisplayState;
use crate::gateway::IoGateway;
use crate::{PanelError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration attributes of a widget element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(HashMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Required `num` attribute
    pub fn num(&self) -> Result<ChannelNum> {
        let raw = self.get("num").ok_or(PanelError::MissingAttribute("num"))?;
        raw.trim()
            .parse::<ChannelNum>()
            .map_err(|_| PanelError::InvalidAttribute {
                name: "num",
                value: raw.to_string(),
            })
    }

    /// Required numeric attribute such as `min` or `max`
    pub fn number(&self, key: &'static str) -> Result<f64> {
        let raw = self.get(key).ok_or(PanelError::MissingAttribute(key))?;
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(PanelError::InvalidAttribute {
                name: key,
                value: raw.to_string(),
            }),
        }
    }

    pub fn name(&self) -> Option<String> {
        self.get("name").map(str::to_string)
    }

    /// Page anchor a menu entry points at
    pub fn target(&self) -> Option<&str> {
        self.get("target")
    }

    /// Presence of `default` marks the page shown first
    pub fn is_default(&self) -> bool {
        self.0.contains_key("default")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Any of the three widget kinds
pub enum Widget {
    DigitalInput(DigitalInputWidget),
    DigitalOutput(DigitalOutputWidget),
    AnalogInput(AnalogInputWidget),
}

impl Widget {
    pub fn create(
        kind: ChannelKind,
        attributes: &Attributes,
        gateway: Arc<dyn IoGateway>,
        events: &Arc<DeviceEvents>,
    ) -> Result<Self> {
        Ok(match kind {
            ChannelKind::DigitalInput => {
                Widget::DigitalInput(DigitalInputWidget::create(attributes, gateway, events)?)
            }
            ChannelKind::DigitalOutput => {
                Widget::DigitalOutput(DigitalOutputWidget::create(attributes, gateway, events)?)
            }
            ChannelKind::AnalogInput => {
                Widget::AnalogInput(AnalogInputWidget::create(attributes, events)?)
            }
        })
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Widget::DigitalInput(_) => ChannelKind::DigitalInput,
            Widget::DigitalOutput(_) => ChannelKind::DigitalOutput,
            Widget::AnalogInput(_) => ChannelKind::AnalogInput,
        }
    }

    pub fn num(&self) -> ChannelNum {
        match self {
            Widget::DigitalInput(w) => w.num(),
            Widget::DigitalOutput(w) => w.num(),
            Widget::AnalogInput(w) => w.num(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Widget::DigitalInput(w) => w.name(),
            Widget::DigitalOutput(w) => w.name(),
            Widget::AnalogInput(w) => w.name(),
        }
    }

    /// Display state of digital widgets; `None` for analog ones
    pub fn state(&self) -> Option<DisplayState> {
        match self {
            Widget::DigitalInput(w) => Some(w.state()),
            Widget::DigitalOutput(w) => Some(w.state()),
            Widget::AnalogInput(_) => None,
        }
    }

    pub async fn attach(&self) {
        match self {
            Widget::DigitalInput(w) => w.attach().await,
            Widget::DigitalOutput(w) => w.attach().await,
            Widget::AnalogInput(_) => {}
        }
    }

    pub fn dispose(&self) {
        match self {
            Widget::DigitalInput(w) => w.dispose(),
            Widget::DigitalOutput(w) => w.dispose(),
            Widget::AnalogInput(w) => w.dispose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_num_fails_fast() {
        let attrs = Attributes::new().with("name", "Pump");
        assert!(matches!(
            attrs.num(),
            Err(PanelError::MissingAttribute("num"))
        ));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let attrs = Attributes::new()
            .with("num", "-1")
            .with("min", "abc")
            .with("max", "inf");
        assert!(matches!(
            attrs.num(),
            Err(PanelError::InvalidAttribute { name: "num", .. })
        ));
        assert!(attrs.number("min").is_err());
        assert!(attrs.number("max").is_err());
    }

    #[test]
    fn reads_presentation_attributes() {
        let attrs: Attributes = [("num", "2"), ("target", "outputs"), ("default", "")]
            .into_iter()
            .collect();
        assert_eq!(attrs.num().unwrap(), 2);
        assert_eq!(attrs.target(), Some("outputs"));
        assert!(attrs.is_default());
        assert_eq!(attrs.name(), None);
    }
}
