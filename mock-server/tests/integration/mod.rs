//! Mock Server Integration Test Module

use iopanel_core::{ApiFlavor, ClientConfig, DisplayState};
use iopanel_mock::server::RunningServer;
use iopanel_mock::{MockConfig, MockServer, MockVariant};
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};

/// Start a mock server on an ephemeral localhost port
pub async fn start_test_server(variant: MockVariant, tweak: impl FnOnce(&mut MockConfig)) -> RunningServer {
    let mut config = MockConfig::local(variant);
    tweak(&mut config);
    MockServer::new(config)
        .spawn()
        .await
        .expect("spawn mock server")
}

/// Client configuration pointing at `server`
pub fn client_config(server: &RunningServer, api: ApiFlavor) -> ClientConfig {
    ClientConfig {
        base_url: server.base_url(),
        api,
        request_timeout_ms: Some(2_000),
        reconnect_delay_ms: 100,
    }
}

/// Block until `n` SSE clients are connected, so no broadcast is missed
pub async fn wait_for_clients(server: &RunningServer, n: usize) {
    timeout(Duration::from_secs(2), async {
        while server.state.bank.broadcaster().subscriber_count() < n {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("SSE client never connected");
}

pub async fn wait_state(rx: &mut watch::Receiver<DisplayState>, want: DisplayState) {
    timeout(Duration::from_secs(2), rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("widget never reached {:?}", want))
        .expect("widget dropped");
}

mod e2e_routed;
mod e2e_shutdown;
mod e2e_single;
