use super::*;
use iopanel_core::{Attributes, ChannelKind, Dashboard, Widget};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn wait_for_no_clients(state: &iopanel_mock::MockState) {
    timeout(Duration::from_secs(2), async {
        while state.bank.broadcaster().subscriber_count() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("SSE client still attached");
}

#[tokio::test]
async fn test_serve_stops_with_event_client_attached() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = MockServer::new(MockConfig::local(MockVariant::Single));
    let state = server.state().clone();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(listener, async move {
        let _ = stop_rx.await;
    }));

    // Reads the event stream until the server closes it
    let client = tokio::spawn(async move {
        let mut response = reqwest::get(format!("http://{}/api/events", addr))
            .await
            .unwrap();
        while let Ok(Some(_)) = response.chunk().await {}
    });
    timeout(Duration::from_secs(2), async {
        while state.bank.broadcaster().subscriber_count() < 1 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("SSE client never connected");

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(2), serving)
        .await
        .expect("server kept running with a client attached")
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(2), client)
        .await
        .expect("event stream never ended")
        .unwrap();
    assert_eq!(state.bank.broadcaster().subscriber_count(), 0);
}

#[tokio::test]
async fn test_dropping_running_server_ends_event_streams() {
    let server = start_test_server(MockVariant::Routed, |c| {
        c.digital_input_period_ms = 60_000;
    })
    .await;
    let cfg = client_config(&server, ApiFlavor::Routed);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    dashboard
        .add(ChannelKind::DigitalOutput, &Attributes::new().with("num", 0))
        .unwrap();
    dashboard.attach_all().await;
    wait_for_clients(&server, 1).await;

    let old_state = server.state.clone();
    drop(server);
    wait_for_no_clients(&old_state).await;
    dashboard.dispose_all();
}

#[tokio::test]
async fn test_client_reconnects_to_restarted_server() {
    let server = start_test_server(MockVariant::Routed, |c| {
        c.digital_input_period_ms = 60_000;
    })
    .await;
    let cfg = client_config(&server, ApiFlavor::Routed);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    dashboard
        .add(ChannelKind::DigitalOutput, &Attributes::new().with("num", 0))
        .unwrap();
    dashboard.attach_all().await;
    wait_for_clients(&server, 1).await;

    let addr = server.addr;
    let old_state = server.state.clone();
    timeout(Duration::from_secs(2), server.shutdown())
        .await
        .expect("server did not stop");
    assert_eq!(old_state.bank.broadcaster().subscriber_count(), 0);

    let restarted = start_test_server(MockVariant::Routed, |c| {
        c.port = addr.port();
        c.digital_input_period_ms = 60_000;
    })
    .await;
    wait_for_clients(&restarted, 1).await;

    reqwest::Client::new()
        .post(format!("{}/api/digital-output?id=0", restarted.base_url()))
        .json(&json!({"state": true}))
        .send()
        .await
        .unwrap();
    let Widget::DigitalOutput(widget) = &dashboard.widgets()[0] else {
        panic!("expected digital output");
    };
    let mut rx = widget.watch();
    wait_state(&mut rx, DisplayState::On).await;
    dashboard.dispose_all();
}
