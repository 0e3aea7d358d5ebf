use super::*;
use iopanel_core::{Attributes, ChannelKind, ClickAction, Dashboard, Widget};
use serde_json::json;

fn output(dashboard: &Dashboard, index: usize) -> &iopanel_core::DigitalOutputWidget {
    match &dashboard.widgets()[index] {
        Widget::DigitalOutput(w) => w,
        _ => panic!("widget {} is not a digital output", index),
    }
}

#[tokio::test]
async fn test_output_broadcast_reaches_matching_widget_only() {
    let server = start_test_server(MockVariant::Single, |_| {}).await;
    let cfg = client_config(&server, ApiFlavor::Single);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    for num in 0..2 {
        dashboard
            .add(ChannelKind::DigitalOutput, &Attributes::new().with("num", num))
            .unwrap();
    }
    dashboard.attach_all().await;
    assert_eq!(output(&dashboard, 0).state(), DisplayState::Off);
    assert_eq!(output(&dashboard, 1).state(), DisplayState::Off);
    wait_for_clients(&server, 1).await;

    // Another client flips output 1
    let resp = reqwest::Client::new()
        .post(format!("{}/api/output/1", server.base_url()))
        .json(&json!({"value": true}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let mut rx = output(&dashboard, 1).watch();
    wait_state(&mut rx, DisplayState::On).await;
    assert_eq!(output(&dashboard, 0).state(), DisplayState::Off);
    dashboard.dispose_all();
}

#[tokio::test]
async fn test_click_writes_through_single_array_api() {
    let server = start_test_server(MockVariant::Single, |_| {}).await;
    let cfg = client_config(&server, ApiFlavor::Single);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    dashboard
        .add(ChannelKind::DigitalOutput, &Attributes::new().with("num", 2))
        .unwrap();
    dashboard.attach_all().await;

    assert_eq!(
        dashboard.click_output(2).await.unwrap(),
        ClickAction::Write(true)
    );
    assert_eq!(output(&dashboard, 0).state(), DisplayState::On);
    assert_eq!(server.state.bank.outputs(), vec![false, false, true]);
}

#[tokio::test]
async fn test_unknown_output_channel_shows_error() {
    let server = start_test_server(MockVariant::Single, |_| {}).await;
    let cfg = client_config(&server, ApiFlavor::Single);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    dashboard
        .add(ChannelKind::DigitalOutput, &Attributes::new().with("num", 7))
        .unwrap();
    dashboard.attach_all().await;
    assert_eq!(output(&dashboard, 0).state(), DisplayState::Error);

    // Retry goes through load again and fails the same way
    assert_eq!(dashboard.click_output(7).await.unwrap(), ClickAction::Reload);
    assert_eq!(output(&dashboard, 0).state(), DisplayState::Error);
}
