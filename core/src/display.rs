// Display state of a digital channel and its projection onto presentation classes
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Client-local, four-valued presentation state of a digital channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Loading,
    On,
    Off,
    Error,
}

impl DisplayState {
    pub const ALL: [DisplayState; 4] = [
        DisplayState::On,
        DisplayState::Off,
        DisplayState::Loading,
        DisplayState::Error,
    ];

    pub fn from_flag(value: bool) -> Self {
        if value {
            DisplayState::On
        } else {
            DisplayState::Off
        }
    }

    /// Presentation class for this state
    pub fn class(&self) -> &'static str {
        match self {
            DisplayState::Loading => "loading",
            DisplayState::On => "on",
            DisplayState::Off => "off",
            DisplayState::Error => "error",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, DisplayState::On | DisplayState::Off)
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class())
    }
}

/// Class set of a rendered widget.
///
/// Exactly one state class is present once a state has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    classes: BTreeSet<&'static str>,
    writes: u64,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the state class; returns false when nothing had to change
    pub fn apply(&mut self, state: DisplayState) -> bool {
        if self.classes.len() == 1 && self.classes.contains(state.class()) {
            return false;
        }
        for s in DisplayState::ALL {
            self.classes.remove(s.class());
        }
        self.classes.insert(state.class());
        self.writes += 1;
        true
    }

    pub fn classes(&self) -> Vec<&'static str> {
        self.classes.iter().copied().collect()
    }

    /// Number of class-set writes so far
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_state_class_is_active() {
        let mut p = Presentation::new();
        for state in DisplayState::ALL {
            p.apply(state);
            assert_eq!(p.classes(), vec![state.class()]);
        }
    }

    #[test]
    fn repeated_state_does_not_touch_classes() {
        let mut p = Presentation::new();
        assert!(p.apply(DisplayState::On));
        let before = p.clone();
        assert!(!p.apply(DisplayState::On));
        assert_eq!(p, before);
        assert_eq!(p.writes(), 1);
    }

    #[test]
    fn flag_projection() {
        assert_eq!(DisplayState::from_flag(true), DisplayState::On);
        assert_eq!(DisplayState::from_flag(false), DisplayState::Off);
        assert!(!DisplayState::Loading.is_settled());
    }
}
