//! Display-state machine shared by the digital-input and digital-output widgets.
//!
//! The machine is pure: it never performs I/O. Callers ask it for a [`Ticket`]
//! before issuing a request and hand the ticket back with the outcome. Every new
//! request and every disposal bumps a generation counter, so a response that
//! arrives for a superseded request or a disposed widget is ignored.
//!
//! | From        | Trigger               | To            |
//! |-------------|-----------------------|---------------|
//! | any         | load issued           | loading       |
//! | loading     | response `b`          | on / off      |
//! | loading     | failure               | error         |
//! | on / off    | click                 | loading (write `!b`) |
//! | error       | click                 | loading (reload)     |
//! | any         | push `b`              | on / off      |

use crate::display::{DisplayState, Presentation};

/// What an outstanding request was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Load,
    Write(bool),
}

/// Proof of an issued request; redeemed with [`ChannelMachine::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    pub request: Request,
}

/// Action a click maps to in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// POST the given value
    Write(bool),
    /// Re-issue the GET after an error
    Reload,
    /// Request in flight (or widget disposed)
    Ignore,
}

#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: DisplayState,
    presentation: Presentation,
    generation: u64,
    in_flight: Option<u64>,
    disposed: bool,
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMachine {
    pub fn new() -> Self {
        let mut presentation = Presentation::new();
        presentation.apply(DisplayState::Loading);
        Self {
            state: DisplayState::Loading,
            presentation,
            generation: 0,
            in_flight: None,
            disposed: false,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Enter `loading` for an initial or retried GET
    pub fn begin_load(&mut self) -> Option<Ticket> {
        self.begin(Request::Load)
    }

    /// Enter `loading` for a POST of `value`
    pub fn begin_write(&mut self, value: bool) -> Option<Ticket> {
        self.begin(Request::Write(value))
    }

    fn begin(&mut self, request: Request) -> Option<Ticket> {
        if self.disposed {
            return None;
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);
        self.set(DisplayState::Loading);
        Some(Ticket {
            generation: self.generation,
            request,
        })
    }

    pub fn click(&self) -> ClickAction {
        if self.disposed {
            return ClickAction::Ignore;
        }
        match self.state {
            DisplayState::On => ClickAction::Write(false),
            DisplayState::Off => ClickAction::Write(true),
            DisplayState::Error => ClickAction::Reload,
            DisplayState::Loading => ClickAction::Ignore,
        }
    }

    /// Apply a request outcome. Returns the new state, or `None` when the ticket is stale.
    pub fn resolve<E>(
        &mut self,
        ticket: Ticket,
        outcome: &std::result::Result<bool, E>,
    ) -> Option<DisplayState> {
        if self.disposed || self.in_flight != Some(ticket.generation) {
            return None;
        }
        self.in_flight = None;
        let next = match outcome {
            Ok(value) => DisplayState::from_flag(*value),
            Err(_) => DisplayState::Error,
        };
        self.set(next);
        Some(next)
    }

    /// Apply a pushed value; bypasses `loading`. Returns whether the state changed.
    pub fn push(&mut self, value: bool) -> bool {
        if self.disposed {
            return false;
        }
        self.set(DisplayState::from_flag(value))
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
        self.generation += 1;
        self.in_flight = None;
    }

    fn set(&mut self, state: DisplayState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        self.presentation.apply(state);
        true
    }
}
