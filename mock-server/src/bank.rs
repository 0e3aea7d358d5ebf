// In-memory channel bank shared by both router variants
//
// Writes commit to the slot and then publish their event while still holding the
// slot lock, so event order on the wire matches commit order.

use crate::broadcast::{EventBroadcaster, SseMessage};
use crate::{MockError, Result};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use tracing::info;

pub struct ChannelBank {
    outputs: RwLock<Vec<bool>>,
    inputs: RwLock<Vec<bool>>,
    broadcaster: EventBroadcaster,
}

impl ChannelBank {
    pub fn new(outputs: Vec<bool>, inputs: Vec<bool>, broadcaster: EventBroadcaster) -> Self {
        Self {
            outputs: RwLock::new(outputs),
            inputs: RwLock::new(inputs),
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn outputs(&self) -> Vec<bool> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn inputs(&self) -> Vec<bool> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn output_count(&self) -> usize {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn input_count(&self) -> usize {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn output(&self, id: usize) -> Result<bool> {
        read_slot(&self.outputs, id)
    }

    pub fn input(&self, id: usize) -> Result<bool> {
        read_slot(&self.inputs, id)
    }

    /// Commit an output value, then publish `announce` if given
    pub fn set_output(&self, id: usize, value: bool, announce: Option<SseMessage>) -> Result<bool> {
        let committed = write_slot(&self.outputs, id, value, announce, &self.broadcaster)?;
        info!(target: "mock_api", id, value, "Output committed");
        Ok(committed)
    }

    /// Commit an input value, then publish `announce` if given
    pub fn set_input(&self, id: usize, value: bool, announce: Option<SseMessage>) -> Result<bool> {
        write_slot(&self.inputs, id, value, announce, &self.broadcaster)
    }
}

fn read_slot(slots: &RwLock<Vec<bool>>, id: usize) -> Result<bool> {
    slots
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .copied()
        .ok_or(MockError::InvalidId)
}

fn write_slot(
    slots: &RwLock<Vec<bool>>,
    id: usize,
    value: bool,
    announce: Option<SseMessage>,
    broadcaster: &EventBroadcaster,
) -> Result<bool> {
    let mut slots = slots.write().unwrap_or_else(PoisonError::into_inner);
    let slot = slots.get_mut(id).ok_or(MockError::InvalidId)?;
    *slot = value;
    if let Some(message) = announce {
        broadcaster.broadcast(message);
    }
    Ok(value)
}

/// Parse a channel id from a path segment or query value; must lie in `[0, len)`
pub fn parse_id(raw: &str, len: usize) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|id| *id < len)
        .ok_or(MockError::InvalidId)
}

/// Pull a JSON boolean out of a request body; anything else is an invalid value
pub fn parse_flag(body: &[u8], field: &str) -> Result<bool> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get(field).and_then(Value::as_bool))
        .ok_or(MockError::InvalidValue)
}
