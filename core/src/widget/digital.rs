// Digital input / output widget controllers
use super::Attributes;
use crate::bus::{DeviceEvents, SubscriptionId};
use crate::channel::{ChannelKind, ChannelNum};
use crate::display::DisplayState;
use crate::event::EventKind;
use crate::gateway::IoGateway;
use crate::state_machine::{ChannelMachine, ClickAction, Request, Ticket};
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, warn};

/// State shared between a widget, its event callbacks and its in-flight requests
struct DigitalChannel {
    kind: ChannelKind,
    num: ChannelNum,
    name: Option<String>,
    machine: Mutex<ChannelMachine>,
    state_tx: watch::Sender<DisplayState>,
    gateway: Arc<dyn IoGateway>,
}

impl DigitalChannel {
    fn new(
        kind: ChannelKind,
        num: ChannelNum,
        name: Option<String>,
        gateway: Arc<dyn IoGateway>,
    ) -> Arc<Self> {
        let machine = ChannelMachine::new();
        let (state_tx, _) = watch::channel(machine.state());
        Arc::new(Self {
            kind,
            num,
            name,
            machine: Mutex::new(machine),
            state_tx,
            gateway,
        })
    }

    fn machine(&self) -> MutexGuard<'_, ChannelMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: DisplayState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    async fn load(&self) {
        let ticket = {
            let mut machine = self.machine();
            let ticket = machine.begin_load();
            self.publish(machine.state());
            ticket
        };
        if let Some(ticket) = ticket {
            self.execute(ticket).await;
        }
    }

    async fn click(&self) -> ClickAction {
        let (action, ticket) = {
            let mut machine = self.machine();
            let action = machine.click();
            let ticket = match action {
                ClickAction::Write(value) => machine.begin_write(value),
                ClickAction::Reload => machine.begin_load(),
                ClickAction::Ignore => None,
            };
            self.publish(machine.state());
            (action, ticket)
        };
        match ticket {
            Some(ticket) => self.execute(ticket).await,
            None => debug!(target: "widget", kind = %self.kind, num = self.num, "Click ignored"),
        }
        action
    }

    async fn execute(&self, ticket: Ticket) {
        let outcome = match ticket.request {
            Request::Load => self.gateway.read(self.kind, self.num).await,
            Request::Write(value) => self.gateway.write_output(self.num, value).await,
        };
        self.settle(ticket, outcome);
    }

    fn settle(&self, ticket: Ticket, outcome: Result<bool>) {
        if let Err(e) = &outcome {
            warn!(target: "widget", kind = %self.kind, num = self.num, error = %e, "Channel request failed");
        }
        let mut machine = self.machine();
        match machine.resolve(ticket, &outcome) {
            Some(state) => self.publish(state),
            None => debug!(target: "widget", kind = %self.kind, num = self.num, "Stale response ignored"),
        }
    }

    /// Apply a pushed value; `defer_to_request` leaves the state alone while a request is in flight
    fn push(&self, value: bool, defer_to_request: bool) {
        let mut machine = self.machine();
        if defer_to_request && machine.is_busy() {
            return;
        }
        if machine.push(value) {
            self.publish(machine.state());
        }
    }

    fn dispose(&self) {
        self.machine().dispose();
    }
}

fn subscribe_flag(
    events: &DeviceEvents,
    kind: EventKind,
    channel: Weak<DigitalChannel>,
    num: ChannelNum,
    defer_to_request: bool,
) -> SubscriptionId {
    events.subscribe(kind, move |event| {
        if event.num != num {
            return;
        }
        let (Some(channel), Some(value)) = (channel.upgrade(), event.as_flag()) else {
            return;
        };
        channel.push(value, defer_to_request);
    })
}

/// Read-only digital channel; follows `digital-input` push events
pub struct DigitalInputWidget {
    channel: Arc<DigitalChannel>,
    events: Arc<DeviceEvents>,
    subscription: SubscriptionId,
}

impl DigitalInputWidget {
    pub fn create(
        attributes: &Attributes,
        gateway: Arc<dyn IoGateway>,
        events: &Arc<DeviceEvents>,
    ) -> Result<Self> {
        let num = attributes.num()?;
        let channel = DigitalChannel::new(ChannelKind::DigitalInput, num, attributes.name(), gateway);
        let subscription = subscribe_flag(
            events,
            EventKind::DigitalInput,
            Arc::downgrade(&channel),
            num,
            false,
        );
        Ok(Self {
            channel,
            events: Arc::clone(events),
            subscription,
        })
    }

    /// Issue the initial GET
    pub async fn attach(&self) {
        self.channel.load().await;
    }

    pub fn num(&self) -> ChannelNum {
        self.channel.num
    }

    pub fn name(&self) -> Option<&str> {
        self.channel.name.as_deref()
    }

    pub fn state(&self) -> DisplayState {
        self.channel.machine().state()
    }

    pub fn classes(&self) -> Vec<&'static str> {
        self.channel.machine().presentation().classes()
    }

    /// Receiver notified on every display-state change
    pub fn watch(&self) -> watch::Receiver<DisplayState> {
        self.channel.state_tx.subscribe()
    }

    pub fn dispose(&self) {
        self.channel.dispose();
        self.events.unsubscribe(self.subscription);
    }
}

impl Drop for DigitalInputWidget {
    fn drop(&mut self) {
        self.events.unsubscribe(self.subscription);
    }
}

/// Writable digital channel; a click toggles it through the gateway
pub struct DigitalOutputWidget {
    channel: Arc<DigitalChannel>,
    events: Arc<DeviceEvents>,
    subscriptions: [SubscriptionId; 2],
}

impl DigitalOutputWidget {
    pub fn create(
        attributes: &Attributes,
        gateway: Arc<dyn IoGateway>,
        events: &Arc<DeviceEvents>,
    ) -> Result<Self> {
        let num = attributes.num()?;
        let channel =
            DigitalChannel::new(ChannelKind::DigitalOutput, num, attributes.name(), gateway);
        // Both APIs announce output changes, under different event names
        let subscriptions = [EventKind::Output, EventKind::DigitalOutput]
            .map(|kind| subscribe_flag(events, kind, Arc::downgrade(&channel), num, true));
        Ok(Self {
            channel,
            events: Arc::clone(events),
            subscriptions,
        })
    }

    /// Issue the initial GET
    pub async fn attach(&self) {
        self.channel.load().await;
    }

    /// Toggle when settled, reload after an error, ignore while loading
    pub async fn click(&self) -> ClickAction {
        self.channel.click().await
    }

    pub fn num(&self) -> ChannelNum {
        self.channel.num
    }

    pub fn name(&self) -> Option<&str> {
        self.channel.name.as_deref()
    }

    pub fn state(&self) -> DisplayState {
        self.channel.machine().state()
    }

    pub fn classes(&self) -> Vec<&'static str> {
        self.channel.machine().presentation().classes()
    }

    pub fn watch(&self) -> watch::Receiver<DisplayState> {
        self.channel.state_tx.subscribe()
    }

    pub fn dispose(&self) {
        self.channel.dispose();
        for id in self.subscriptions {
            self.events.unsubscribe(id);
        }
    }
}

impl Drop for DigitalOutputWidget {
    fn drop(&mut self) {
        for id in self.subscriptions {
            self.events.unsubscribe(id);
        }
    }
}
