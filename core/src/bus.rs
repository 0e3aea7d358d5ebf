// Device event bus client
//
// One shared server-push connection, opened lazily on the first subscription and
// kept for the lifetime of the `DeviceEvents` service. Frames are decoded once and
// fanned out to the callbacks registered for their event kind.
use crate::config::ClientConfig;
use crate::event::{DeviceEvent, EventKind};
use crate::sse::{SseDecoder, SseFrame};
use crate::{PanelError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Frames buffered between the transport and the dispatcher
const FRAME_QUEUE: usize = 256;

/// Callback invoked for every decoded event of a subscribed kind
pub type EventCallback = Arc<dyn Fn(&DeviceEvent) + Send + Sync>;

/// Handle returned by [`DeviceEvents::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Source of raw SSE frames
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open the stream. Frames arrive on the receiver until the transport gives up.
    async fn open(&self) -> Result<mpsc::Receiver<SseFrame>>;
}

/// Event bus statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBusStats {
    pub frames_received: u64,
    pub events_delivered: u64,
    pub malformed_dropped: u64,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    events_delivered: AtomicU64,
    malformed_dropped: AtomicU64,
}

struct Listener {
    id: SubscriptionId,
    callback: EventCallback,
}

/// Device event bus client
pub struct DeviceEvents {
    transport: Arc<dyn EventTransport>,
    listeners: Arc<DashMap<EventKind, Vec<Listener>>>,
    counters: Arc<Counters>,
    next_id: AtomicU64,
    connection: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DeviceEvents {
    pub fn new(transport: Arc<dyn EventTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            listeners: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            next_id: AtomicU64::new(1),
            connection: std::sync::Mutex::new(None),
        })
    }

    /// Bus backed by the `/api/events` endpoint of `cfg.base_url`
    pub fn connect_http(cfg: &ClientConfig) -> Result<Arc<Self>> {
        Ok(Self::new(Arc::new(HttpEventTransport::new(cfg)?)))
    }

    /// Register `callback` for events of `kind`. Opens the connection on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.entry(kind).or_default().push(Listener {
            id,
            callback: Arc::new(callback),
        });
        debug!(target: "device_events", event = %kind, "Subscribed");

        self.ensure_connected();
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        for mut entry in self.listeners.iter_mut() {
            entry.value_mut().retain(|l| l.id != id);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(|l| l.len()).unwrap_or(0)
    }

    /// Whether the shared connection has been started
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            events_delivered: self.counters.events_delivered.load(Ordering::Relaxed),
            malformed_dropped: self.counters.malformed_dropped.load(Ordering::Relaxed),
        }
    }

    fn ensure_connected(&self) {
        let mut connection = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if connection.is_some() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(target: "device_events", "No tokio runtime; event stream not opened yet");
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let listeners = Arc::clone(&self.listeners);
        let counters = Arc::clone(&self.counters);
        *connection = Some(runtime.spawn(async move {
            match transport.open().await {
                Ok(mut rx) => {
                    info!(target: "device_events", "Event stream opened");
                    while let Some(frame) = rx.recv().await {
                        dispatch(&listeners, &counters, &frame);
                    }
                    info!(target: "device_events", "Event stream closed");
                }
                Err(e) => {
                    error!(target: "device_events", error = %e, "Failed to open event stream");
                }
            }
        }));
    }
}

impl Drop for DeviceEvents {
    fn drop(&mut self) {
        if let Some(handle) = self
            .connection
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

fn dispatch(listeners: &DashMap<EventKind, Vec<Listener>>, counters: &Counters, frame: &SseFrame) {
    counters.frames_received.fetch_add(1, Ordering::Relaxed);

    let Some(kind) = EventKind::from_name(frame.event_name()) else {
        trace!(target: "device_events", name = frame.event_name(), "Ignoring unknown event");
        return;
    };

    // Copy the callbacks out so a callback may (un)subscribe without deadlocking the map
    let callbacks: Vec<EventCallback> = match listeners.get(&kind) {
        Some(entry) if !entry.is_empty() => entry.iter().map(|l| Arc::clone(&l.callback)).collect(),
        _ => return,
    };

    match DeviceEvent::decode(kind, &frame.data) {
        Ok(event) => {
            for callback in callbacks {
                callback(&event);
                counters.events_delivered.fetch_add(1, Ordering::Relaxed);
            }
        }
        Err(e) => {
            counters.malformed_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(target: "device_events", event = %kind, error = %e, "Event: parse fail");
        }
    }
}

/// SSE transport over HTTP with reconnect-after-delay, like a browser `EventSource`
pub struct HttpEventTransport {
    http: Client,
    url: String,
    reconnect_delay: Duration,
}

impl HttpEventTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        // No request timeout: the body of an event stream never ends on its own
        let http = Client::builder().build().map_err(PanelError::Http)?;
        Ok(Self {
            http,
            url: cfg.events_url(),
            reconnect_delay: Duration::from_millis(cfg.reconnect_delay_ms),
        })
    }
}

#[async_trait]
impl EventTransport for HttpEventTransport {
    async fn open(&self) -> Result<mpsc::Receiver<SseFrame>> {
        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        let http = self.http.clone();
        let url = self.url.clone();
        let mut delay = self.reconnect_delay;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    outcome = stream_once(&http, &url, &tx, &mut delay) => match outcome {
                        Ok(()) => info!(target: "device_events", url = %url, "Event stream ended"),
                        Err(e) => warn!(target: "device_events", url = %url, error = %e, "Event stream failed"),
                    },
                }
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            debug!(target: "device_events", url = %url, "Event stream reader stopped");
        });

        Ok(rx)
    }
}

async fn stream_once(
    http: &Client,
    url: &str,
    tx: &mpsc::Sender<SseFrame>,
    delay: &mut Duration,
) -> Result<()> {
    let mut response = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PanelError::Status(status.as_u16()));
    }
    info!(target: "device_events", url = %url, "Event stream connected");

    let mut decoder = SseDecoder::new();
    while let Some(chunk) = response.chunk().await? {
        for frame in decoder.feed(&chunk) {
            if let Some(ms) = frame.retry {
                *delay = Duration::from_millis(ms);
            }
            if tx.send(frame).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// In-process transport fed through an `mpsc` sender; can be opened once
pub struct MemoryTransport {
    frames: Mutex<Option<mpsc::Receiver<SseFrame>>>,
    opens: AtomicUsize,
}

impl MemoryTransport {
    pub fn channel(capacity: usize) -> (Arc<Self>, mpsc::Sender<SseFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let transport = Arc::new(Self {
            frames: Mutex::new(Some(rx)),
            opens: AtomicUsize::new(0),
        });
        (transport, tx)
    }

    /// How many times `open` was called
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn open(&self) -> Result<mpsc::Receiver<SseFrame>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.frames
            .lock()
            .await
            .take()
            .ok_or_else(|| PanelError::Unsupported("memory transport already opened".into()))
    }
}
