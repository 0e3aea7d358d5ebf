// Device push events: names, payloads and decoding
use crate::channel::{deserialize_flag, ChannelKind, ChannelNum};
use crate::{PanelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a push event on the shared SSE connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    /// Output change broadcast by the single-array mock API
    Output,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DigitalInput => "digital-input",
            EventKind::DigitalOutput => "digital-output",
            EventKind::AnalogInput => "analog-input",
            EventKind::Output => "output",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "digital-input" => Some(EventKind::DigitalInput),
            "digital-output" => Some(EventKind::DigitalOutput),
            "analog-input" => Some(EventKind::AnalogInput),
            "output" => Some(EventKind::Output),
            _ => None,
        }
    }

    /// Channel kind whose widgets care about this event
    pub fn channel_kind(&self) -> ChannelKind {
        match self {
            EventKind::DigitalInput => ChannelKind::DigitalInput,
            EventKind::DigitalOutput | EventKind::Output => ChannelKind::DigitalOutput,
            EventKind::AnalogInput => ChannelKind::AnalogInput,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a push event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventValue {
    Flag(bool),
    Level(f64),
}

/// A decoded push event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceEvent {
    pub kind: EventKind,
    pub num: ChannelNum,
    pub value: EventValue,
}

impl DeviceEvent {
    pub fn flag(kind: EventKind, num: ChannelNum, value: bool) -> Self {
        Self {
            kind,
            num,
            value: EventValue::Flag(value),
        }
    }

    pub fn level(num: ChannelNum, value: f64) -> Self {
        Self {
            kind: EventKind::AnalogInput,
            num,
            value: EventValue::Level(value),
        }
    }

    /// Decode the `data:` field of an SSE frame named after `kind`
    pub fn decode(kind: EventKind, data: &str) -> Result<Self> {
        let parse_err = |e: serde_json::Error| PanelError::EventParse(format!("{kind}: {e}"));
        match kind {
            EventKind::DigitalInput | EventKind::DigitalOutput => {
                let p: DigitalPayload = serde_json::from_str(data).map_err(parse_err)?;
                Ok(Self::flag(kind, p.num, p.value))
            }
            EventKind::AnalogInput => {
                let p: SamplePayload<f64> = serde_json::from_str(data).map_err(parse_err)?;
                if !p.value.is_finite() {
                    return Err(PanelError::EventParse(format!(
                        "{kind}: non-finite value {}",
                        p.value
                    )));
                }
                Ok(Self::level(p.num, p.value))
            }
            EventKind::Output => {
                let p: OutputEnvelope = serde_json::from_str(data).map_err(parse_err)?;
                Ok(Self::flag(kind, p.data.id, p.data.value))
            }
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self.value {
            EventValue::Flag(b) => Some(b),
            EventValue::Level(_) => None,
        }
    }

    pub fn as_level(&self) -> Option<f64> {
        match self.value {
            EventValue::Level(v) => Some(v),
            EventValue::Flag(_) => None,
        }
    }
}

/// `{ "num": n, "value": v }` payload of the routed API events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePayload<V> {
    pub num: ChannelNum,
    pub value: V,
}

#[derive(Deserialize)]
struct DigitalPayload {
    num: ChannelNum,
    #[serde(deserialize_with = "deserialize_flag")]
    value: bool,
}

/// `{ "id": n, "value": bool }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChange {
    pub id: ChannelNum,
    pub value: bool,
}

/// `{ "event": "output", "data": { "id": n, "value": bool } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEnvelope {
    pub event: String,
    pub data: OutputChange,
}

impl OutputEnvelope {
    pub fn new(change: OutputChange) -> Self {
        Self {
            event: EventKind::Output.as_str().to_string(),
            data: change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_digital_input_as_integer_flag() {
        let ev = DeviceEvent::decode(EventKind::DigitalInput, r#"{"num":2,"value":1}"#).unwrap();
        assert_eq!(ev.num, 2);
        assert_eq!(ev.as_flag(), Some(true));

        let ev = DeviceEvent::decode(EventKind::DigitalInput, r#"{"num":2, "value":0}"#).unwrap();
        assert_eq!(ev.as_flag(), Some(false));
    }

    #[test]
    fn decodes_output_envelope() {
        let ev = DeviceEvent::decode(
            EventKind::Output,
            r#"{"event":"output","data":{"id":1,"value":true}}"#,
        )
        .unwrap();
        assert_eq!(ev.kind, EventKind::Output);
        assert_eq!(ev.num, 1);
        assert_eq!(ev.as_flag(), Some(true));
    }

    #[test]
    fn decodes_float_analog_values() {
        let ev = DeviceEvent::decode(EventKind::AnalogInput, r#"{"num":3,"value":41.5}"#).unwrap();
        assert_eq!(ev.as_level(), Some(41.5));
        assert_eq!(ev.as_flag(), None);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            DeviceEvent::decode(EventKind::AnalogInput, "not json"),
            Err(PanelError::EventParse(_))
        ));
        assert!(DeviceEvent::decode(EventKind::DigitalInput, r#"{"value":1}"#).is_err());
        assert!(DeviceEvent::decode(EventKind::Output, r#"{"num":1,"value":true}"#).is_err());
    }

    #[test]
    fn output_events_target_digital_output_widgets() {
        assert_eq!(
            EventKind::Output.channel_kind(),
            ChannelKind::DigitalOutput
        );
        assert_eq!(EventKind::from_name("message"), None);
    }
}
