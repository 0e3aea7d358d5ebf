// Mock device HTTP server
//
// Shared endpoints (`GET /api`, `GET /api/events`) plus the variant's channel routes.

use crate::bank::ChannelBank;
use crate::broadcast::{EventBroadcaster, SseMessage};
use crate::config::{MockConfig, MockVariant};
use crate::simulator::InputSimulator;
use crate::{routed, single, MockError, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream, WatchStream};
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const LIVENESS: &str = "mock api is running";

/// State handed to every handler
#[derive(Clone)]
pub struct MockState {
    pub bank: Arc<ChannelBank>,
    pub variant: MockVariant,
    /// Flips to true once the server is stopping; open event streams end on it
    shutdown: watch::Receiver<bool>,
}

impl MockState {
    pub fn new(config: &MockConfig, shutdown: watch::Receiver<bool>) -> Self {
        let broadcaster = EventBroadcaster::new(config.broadcast_capacity);
        let outputs = vec![false; config.output_count];
        let inputs = match config.variant {
            MockVariant::Single => Vec::new(),
            // off, on, off, on ...
            MockVariant::Routed => (0..config.input_count).map(|i| i % 2 == 1).collect(),
        };
        Self {
            bank: Arc::new(ChannelBank::new(outputs, inputs, broadcaster)),
            variant: config.variant,
            shutdown,
        }
    }
}

pub struct MockServer {
    config: MockConfig,
    state: MockState,
    shutdown_tx: watch::Sender<bool>,
}

/// A server spawned in the background.
///
/// Dropping it stops the timers, ends every open event stream and lets the
/// server finish its remaining connections on its own.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub state: MockState,
    shutdown_tx: watch::Sender<bool>,
    server: Option<JoinHandle<()>>,
    timers: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop and wait until the listener and every connection are closed
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(server) = self.server.take() {
            let _ = server.await;
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for timer in &self.timers {
            timer.abort();
        }
    }
}

impl MockServer {
    pub fn new(config: MockConfig) -> Self {
        let (shutdown_tx, shutdown) = watch::channel(false);
        let state = MockState::new(&config, shutdown);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    /// Full router for the configured variant
    pub fn router(&self) -> Router {
        let variant_routes = match self.config.variant {
            MockVariant::Single => single::routes(),
            MockVariant::Routed => routed::routes(),
        };

        Router::new()
            .route("/api", get(liveness_handler))
            .route("/api/events", get(event_stream_handler))
            .merge(variant_routes)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    fn start_timers(&self) -> Vec<JoinHandle<()>> {
        match self.config.variant {
            MockVariant::Single => Vec::new(),
            MockVariant::Routed => InputSimulator::new(
                Arc::clone(&self.state.bank),
                Duration::from_millis(self.config.digital_input_period_ms),
                Duration::from_millis(self.config.analog_period_ms),
            )
            .spawn()
            .into(),
        }
    }

    async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| MockError::Bind { addr, source })
    }

    /// Serve until ctrl-c
    pub async fn serve(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serve on `listener` until `signal` resolves, then close the event streams
    /// and wait for the open connections to finish
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let timers = self.start_timers();
        info!(
            target: "mock_api",
            url = %format!("http://{}", listener.local_addr()?),
            variant = ?self.config.variant,
            "Mock API ready"
        );

        let shutdown_tx = self.shutdown_tx;
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.await;
                info!(target: "mock_api", "Shutting down");
                let _ = shutdown_tx.send(true);
            })
            .await;
        for timer in timers {
            timer.abort();
        }
        result.map_err(MockError::Io)
    }

    /// Bind and serve in the background
    pub async fn spawn(self) -> Result<RunningServer> {
        let listener = self.bind().await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let timers = self.start_timers();
        let mut stop = self.state.shutdown.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.wait_for(|stopping| *stopping).await;
                })
                .await;
            match result {
                Ok(()) => info!(target: "mock_api", "Mock API stopped"),
                Err(e) => error!(target: "mock_api", error = %e, "Mock API failed"),
            }
        });
        Ok(RunningServer {
            addr,
            state: self.state,
            shutdown_tx: self.shutdown_tx,
            server: Some(server),
            timers,
        })
    }
}

async fn liveness_handler() -> &'static str {
    LIVENESS
}

enum Feed {
    Message(SseMessage),
    Lagged(u64),
    Stop,
}

struct ClientGuard;

impl Drop for ClientGuard {
    fn drop(&mut self) {
        info!(target: "mock_api", "SSE client disconnected");
    }
}

async fn event_stream_handler(
    State(state): State<MockState>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.bank.broadcaster().subscribe();
    let shutdown = state.shutdown.clone();
    info!(
        target: "mock_api",
        clients = state.bank.broadcaster().subscriber_count(),
        "SSE client connected"
    );

    let messages = BroadcastStream::new(rx).map(|result| match result {
        Ok(message) => Feed::Message(message),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => Feed::Lagged(skipped),
    });
    // Yields the current flag first, so a stream opened mid-shutdown ends at once
    let stopping = WatchStream::new(shutdown)
        .filter(|stopping| *stopping)
        .map(|_| Feed::Stop);

    let guard = ClientGuard;
    let stream = messages
        .merge(stopping)
        .take_while(|feed| !matches!(feed, Feed::Stop))
        .filter_map(move |feed| {
            let _ = &guard;
            match feed {
                Feed::Message(message) => {
                    Some(Ok(Event::default().event(message.event).data(message.data)))
                }
                Feed::Lagged(skipped) => {
                    warn!(target: "mock_api", skipped, "SSE client lagging, events skipped");
                    None
                }
                Feed::Stop => None,
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
