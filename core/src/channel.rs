// Channel model and the JSON bodies exchanged with the device API
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Channel number, scoped independently per kind
pub type ChannelNum = u32;

/// Kind of an addressable I/O point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
}

impl ChannelKind {
    /// Path segment used by the routed API (`/api/<segment>?id=<num>`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::DigitalInput => "digital-input",
            ChannelKind::DigitalOutput => "digital-output",
            ChannelKind::AnalogInput => "analog-input",
        }
    }

    pub fn is_digital(&self) -> bool {
        matches!(self, ChannelKind::DigitalInput | ChannelKind::DigitalOutput)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "digital-input" => Some(ChannelKind::DigitalInput),
            "digital-output" => Some(ChannelKind::DigitalOutput),
            "analog-input" => Some(ChannelKind::AnalogInput),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ "state": bool }` body of the routed API.
///
/// The firmware answers with `{"state":1}`, the mock servers with `{"state":true}`;
/// both decode to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBody {
    #[serde(deserialize_with = "deserialize_flag")]
    pub state: bool,
}

/// `{ "value": bool }` body of the single-array API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBody {
    pub value: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

/// Accepts a JSON boolean or an integer; an integer is `true` only when it is 1
pub fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n == 1,
    })
}
