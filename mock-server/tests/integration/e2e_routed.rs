use super::*;
use iopanel_core::{Attributes, ChannelKind, ClickAction, Dashboard, Widget};
use serde_json::json;

#[tokio::test]
async fn test_output_write_round_trips_and_broadcasts() {
    let server = start_test_server(MockVariant::Routed, |c| {
        c.digital_input_period_ms = 60_000;
    })
    .await;
    let cfg = client_config(&server, ApiFlavor::Routed);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    for num in [1, 2] {
        dashboard
            .add(ChannelKind::DigitalOutput, &Attributes::new().with("num", num))
            .unwrap();
    }
    dashboard.attach_all().await;
    wait_for_clients(&server, 1).await;

    assert_eq!(
        dashboard.click_output(1).await.unwrap(),
        ClickAction::Write(true)
    );
    assert_eq!(server.state.bank.output(1).unwrap(), true);

    // A write from elsewhere arrives as a digital-output event
    reqwest::Client::new()
        .post(format!("{}/api/digital-output?id=2", server.base_url()))
        .json(&json!({"state": true}))
        .send()
        .await
        .unwrap();
    let Widget::DigitalOutput(second) = &dashboard.widgets()[1] else {
        panic!("expected digital output");
    };
    let mut rx = second.watch();
    wait_state(&mut rx, DisplayState::On).await;
}

#[tokio::test]
async fn test_inputs_load_initial_state() {
    let server = start_test_server(MockVariant::Routed, |c| {
        c.digital_input_period_ms = 60_000;
    })
    .await;
    let cfg = client_config(&server, ApiFlavor::Routed);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    for num in 0..4 {
        dashboard
            .add(ChannelKind::DigitalInput, &Attributes::new().with("num", num))
            .unwrap();
    }
    dashboard.attach_all().await;

    let states: Vec<_> = dashboard
        .snapshot()
        .widgets
        .into_iter()
        .map(|w| w.state)
        .collect();
    assert_eq!(
        states,
        vec![
            Some(DisplayState::Off),
            Some(DisplayState::On),
            Some(DisplayState::Off),
            Some(DisplayState::On),
        ]
    );
}

#[tokio::test]
async fn test_simulated_input_reaches_widget() {
    let server = start_test_server(MockVariant::Routed, |c| {
        c.input_count = 1;
        c.digital_input_period_ms = 20;
    })
    .await;
    let cfg = client_config(&server, ApiFlavor::Routed);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    dashboard
        .add(ChannelKind::DigitalInput, &Attributes::new().with("num", 0))
        .unwrap();
    dashboard.attach_all().await;
    let Widget::DigitalInput(widget) = &dashboard.widgets()[0] else {
        panic!("expected digital input");
    };

    // With one channel every flip targets it; both states show up quickly
    let mut rx = widget.watch();
    wait_state(&mut rx, DisplayState::On).await;
    wait_state(&mut rx, DisplayState::Off).await;
}

#[tokio::test]
async fn test_analog_widget_plots_simulated_sine() {
    let server = start_test_server(MockVariant::Routed, |c| {
        c.analog_period_ms = 10;
    })
    .await;
    let cfg = client_config(&server, ApiFlavor::Routed);

    let mut dashboard = Dashboard::connect(&cfg).unwrap();
    dashboard
        .add(
            ChannelKind::AnalogInput,
            &Attributes::new()
                .with("num", 0)
                .with("min", 0)
                .with("max", 100),
        )
        .unwrap();
    let Widget::AnalogInput(widget) = &dashboard.widgets()[0] else {
        panic!("expected analog input");
    };

    let mut rx = widget.watch();
    timeout(
        Duration::from_secs(2),
        rx.wait_for(|path| path.split_whitespace().count() >= 2 + 2 * 4),
    )
    .await
    .expect("no analog samples")
    .unwrap();

    // Freeze the trend before comparing
    widget.dispose();
    sleep(Duration::from_millis(50)).await;

    let latest = widget.latest().unwrap();
    assert!((40.0..=60.0).contains(&latest));
    assert_eq!(widget.samples()[0], widget.scale().to_display(latest));
    assert!(widget.samples().len() <= widget.capacity());
}
