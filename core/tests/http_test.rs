// Event stream and gateway behavior against a hand-written HTTP device on a raw socket
use iopanel_core::{
    ApiFlavor, ClientConfig, DeviceEvent, DeviceEvents, EventKind, IoGateway, SingleArrayGateway,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

fn config(listener: &TcpListener, api: ApiFlavor, reconnect_delay_ms: u64) -> ClientConfig {
    ClientConfig {
        base_url: format!("http://{}", listener.local_addr().unwrap()),
        api,
        request_timeout_ms: Some(2_000),
        reconnect_delay_ms,
    }
}

/// Read one request including its body; returns the request line
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return head.lines().next().unwrap_or_default().to_string();
            }
        }
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-request");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Event stream response; the body ends when the socket is dropped
async fn send_events(socket: &mut TcpStream, body: &str) {
    let head = "HTTP/1.1 200 OK\r\n\
                content-type: text/event-stream\r\n\
                cache-control: no-cache\r\n\
                connection: close\r\n\r\n";
    socket.write_all(head.as_bytes()).await.unwrap();
    socket.write_all(body.as_bytes()).await.unwrap();
    socket.flush().await.unwrap();
}

async fn send_body(socket: &mut TcpStream, content_type: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.flush().await.unwrap();
}

fn collect(bus: &DeviceEvents, kind: EventKind) -> mpsc::UnboundedReceiver<DeviceEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    bus.subscribe(kind, move |event| {
        let _ = tx.send(*event);
    });
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<DeviceEvent>) -> DeviceEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no event before timeout")
        .expect("channel closed")
}

#[tokio::test]
async fn event_stream_reconnects_after_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(&listener, ApiFlavor::Routed, 50);

    let device = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        let request = read_request(&mut first).await;
        assert!(request.starts_with("GET /api/events "), "{}", request);
        send_events(&mut first, "event: digital-input\ndata: {\"num\":0,\"value\":1}\n\n").await;
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        read_request(&mut second).await;
        send_events(&mut second, "event: digital-input\ndata: {\"num\":0,\"value\":0}\n\n").await;
        second
    });

    let bus = DeviceEvents::connect_http(&cfg).unwrap();
    let mut rx = collect(&bus, EventKind::DigitalInput);
    assert_eq!(next(&mut rx).await.as_flag(), Some(true));
    assert_eq!(next(&mut rx).await.as_flag(), Some(false));

    let _open = device.await.unwrap();
}

#[tokio::test]
async fn retry_hint_replaces_reconnect_delay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    // Far longer than the test waits; only the server's hint can bring the client back in time
    let cfg = config(&listener, ApiFlavor::Routed, 60_000);

    let device = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        read_request(&mut first).await;
        send_events(
            &mut first,
            "retry: 50\nevent: digital-input\ndata: {\"num\":3,\"value\":1}\n\n",
        )
        .await;
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        read_request(&mut second).await;
        send_events(&mut second, "event: digital-input\ndata: {\"num\":3,\"value\":0}\n\n").await;
        second
    });

    let bus = DeviceEvents::connect_http(&cfg).unwrap();
    let mut rx = collect(&bus, EventKind::DigitalInput);
    let first = next(&mut rx).await;
    assert_eq!((first.num, first.as_flag()), (3, Some(true)));
    let second = next(&mut rx).await;
    assert_eq!((second.num, second.as_flag()), (3, Some(false)));

    let _open = device.await.unwrap();
}

#[tokio::test]
async fn single_array_write_reports_committed_value() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cfg = config(&listener, ApiFlavor::Single, 50);

    // Acknowledges the write but keeps every output off
    let device = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..2 {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            if request.starts_with("POST ") {
                send_body(&mut socket, "text/plain", "success").await;
            } else {
                send_body(&mut socket, "application/json", "[false,false,false]").await;
            }
            requests.push(request);
        }
        requests
    });

    let gateway = SingleArrayGateway::new(cfg).unwrap();
    assert!(!gateway.write_output(1, true).await.unwrap());

    let requests = device.await.unwrap();
    assert!(requests[0].starts_with("POST /api/output/1 "), "{}", requests[0]);
    assert!(requests[1].starts_with("GET /api/output "), "{}", requests[1]);
}
