#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use game_server::config::Config;
use game_server::AppState;
use pointer_common::NameGenerator;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration used by every test: small deadlines, a fixed room name.
pub fn test_config() -> Config {
    Config {
        room_name: Some("Room Test".to_string()),
        queue_capacity: 16,
        write_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

pub fn test_state() -> AppState {
    AppState::new(test_config(), NameGenerator::builtin())
}

/// Build the application router wired to a fresh state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = game_server::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing.
/// The server runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn connect(addr: SocketAddr) -> WsStream {
    let url = format!("ws://{addr}/subscribe");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Next frame that is not a ping/pong, within five seconds.
pub async fn next_frame(ws: &mut WsStream) -> Message {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

/// Next text frame parsed as JSON.
pub async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    let msg = next_frame(ws).await;
    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse JSON frame")
}

/// Assert no data frame arrives within `wait`.
pub async fn assert_silent(ws: &mut WsStream, wait: Duration) {
    let deadline = time::Instant::now() + wait;
    loop {
        match time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }
}

/// Connect and consume the HANDSHAKE; returns the stream and assigned ID.
pub async fn join(addr: SocketAddr) -> (WsStream, String) {
    let mut ws = connect(addr).await;
    let handshake = next_json(&mut ws).await;
    assert_eq!(handshake["event"], "HANDSHAKE");
    let id = handshake["userId"].as_str().expect("userId").to_string();
    (ws, id)
}

/// Poll until the room has `count` subscribers, or panic after five seconds.
pub async fn wait_for_subscribers(state: &AppState, count: usize) {
    time::timeout(Duration::from_secs(5), async {
        while state.room.subscriber_count() != count {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {count} subscribers, room has {}",
            state.room.subscriber_count()
        )
    });
}
