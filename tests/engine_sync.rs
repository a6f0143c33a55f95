// tests/engine_sync.rs
// End-to-end tests: the engine as a client of a local gesture server.

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use aegis_hud::{ConnectionPhase, HudSnapshot, SocketConfig};

fn config(endpoint: &str) -> SocketConfig {
    SocketConfig {
        endpoint: endpoint.to_string(),
        reconnect_delay_ms: 300,
        max_retries: 5,
        backoff_cap_ms: 1_000,
    }
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn wait_for<F>(rx: &mut watch::Receiver<HudSnapshot>, mut cond: F) -> HudSnapshot
where
    F: FnMut(&HudSnapshot) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if cond(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("condition not reached in time")
}

async fn next_text(server: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        match timeout(Duration::from_secs(5), server.next())
            .await
            .expect("no frame from client")
        {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn syncs_state_from_gesture_feed() {
    let (listener, url) = bind().await;
    let hud = aegis_hud::spawn(config(&url)).unwrap();
    let mut server = accept(&listener).await;
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    for frame in [
        r#"{"type":"INIT","timestamp":"2026-08-05T00:00:00+00:00","data":{"camera":{"lat":0.0,"lon":0.0,"altitude":15000000},"markers":[]}}"#,
        r#"{"type":"MOVE","data":{"lat":-6.2088,"lon":106.8456,"altitude":15000000,"target_name":"Jakarta Flood"}}"#,
        r#"{"type":"SELECT","data":{"lat":-6.0,"lon":107.0,"marker_type":"relief"}}"#,
        r#"{"type":"ALERT","data":{"level":"critical","message":"New flood zone detected in sector 7"}}"#,
        r#"{"type":"TOOL_EXECUTE","data":{"tool":"NASA_FIRMS","status":"Fetching fire data..."}}"#,
        r#"{"type":"VOICE_START","data":{}}"#,
    ] {
        server.send(Message::Text(frame.into())).await.unwrap();
    }

    let snapshot = wait_for(&mut rx, |s| s.is_listening).await;
    let camera = snapshot.camera.as_ref().unwrap();
    assert_eq!(camera.target_name.as_deref(), Some("Jakarta Flood"));
    assert_eq!(camera.lat, -6.2088);
    assert_eq!(snapshot.markers.len(), 1);
    assert_eq!(snapshot.markers[0].kind.as_deref(), Some("relief"));
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(
        snapshot.alerts[0].message,
        "New flood zone detected in sector 7"
    );
    assert_eq!(snapshot.current_tool.as_ref().unwrap().tool, "NASA_FIRMS");

    hud.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_leave_state_untouched() {
    let (listener, url) = bind().await;
    let hud = aegis_hud::spawn(config(&url)).unwrap();
    let mut server = accept(&listener).await;
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    for frame in [
        "not json",
        r#"{"type":"TELEPORT","data":{}}"#,
        r#"{"type":"SELECT","data":{"lat":"not a number"}}"#,
        r#"{"type":"MOVE","data":{"lat":3.5,"lon":7.25}}"#,
    ] {
        server.send(Message::Text(frame.into())).await.unwrap();
    }

    let snapshot = wait_for(&mut rx, |s| s.camera.is_some()).await;
    assert_eq!(snapshot.camera.as_ref().unwrap().lat, 3.5);
    assert!(snapshot.markers.is_empty());
    assert!(snapshot.alerts.is_empty());

    hud.shutdown().await;
}

#[tokio::test]
async fn reconnects_once_after_configured_delay() {
    let (listener, url) = bind().await;
    let hud = aegis_hud::spawn(config(&url)).unwrap();
    let server = accept(&listener).await;
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    let dropped_at = Instant::now();
    drop(server);
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Disconnected).await;

    let _server = accept(&listener).await;
    let elapsed = dropped_at.elapsed();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    assert!(
        elapsed >= Duration::from_millis(290),
        "reconnected too early: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(2_000),
        "reconnected too late: {elapsed:?}"
    );

    hud.shutdown().await;
}

#[tokio::test]
async fn gives_up_after_retry_cap() {
    let (listener, url) = bind().await;
    drop(listener);

    let hud = aegis_hud::spawn(SocketConfig {
        endpoint: url,
        reconnect_delay_ms: 50,
        max_retries: 2,
        backoff_cap_ms: 100,
    })
    .unwrap();
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::GaveUp).await;

    hud.shutdown().await;
}

#[tokio::test]
async fn commands_reach_the_server_in_order() {
    let (listener, url) = bind().await;
    let hud = aegis_hud::spawn(config(&url)).unwrap();
    let mut server = accept(&listener).await;
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    hud.start_listening();
    hud.stop_listening(Some("mark the shelter".to_string()));
    hud.drop_marker(25.7617, -80.1918);

    let frame = next_text(&mut server).await;
    assert_eq!(frame["command"], "START_LISTENING");

    let frame = next_text(&mut server).await;
    assert_eq!(frame["command"], "STOP_LISTENING");
    assert_eq!(frame["transcription"], "mark the shelter");

    let frame = next_text(&mut server).await;
    assert_eq!(frame["command"], "DROP_MARKER");
    assert_eq!(frame["lat"], 25.7617);
    assert_eq!(frame["lon"], -80.1918);

    hud.shutdown().await;
}

#[tokio::test]
async fn commands_while_disconnected_are_dropped() {
    let (listener, url) = bind().await;
    let hud = aegis_hud::spawn(config(&url)).unwrap();
    let server = accept(&listener).await;
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    drop(server);
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Disconnected).await;
    hud.drop_marker(1.0, 1.0);

    let mut server = accept(&listener).await;
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;
    hud.drop_marker(99.0, 42.0);

    let frame = next_text(&mut server).await;
    assert_eq!(frame["command"], "DROP_MARKER");
    assert_eq!(frame["lat"], 99.0);

    hud.shutdown().await;
}

#[tokio::test]
async fn shutdown_cancels_pending_reconnect() {
    let (listener, url) = bind().await;
    let hud = aegis_hud::spawn(SocketConfig {
        endpoint: url,
        reconnect_delay_ms: 1_000,
        max_retries: 5,
        backoff_cap_ms: 2_000,
    })
    .unwrap();
    let server = accept(&listener).await;
    let mut rx = hud.watch();
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Connected).await;

    drop(server);
    wait_for(&mut rx, |s| s.phase == ConnectionPhase::Disconnected).await;
    hud.shutdown().await;

    let reconnected = timeout(Duration::from_millis(1_500), listener.accept()).await;
    assert!(reconnected.is_err(), "engine reconnected after shutdown");
}
