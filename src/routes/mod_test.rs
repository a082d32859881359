use super::*;
use crate::config::RelayConfig;
use crate::frame::Frame;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_app(config: RelayConfig) -> (SocketAddr, AppState) {
    let state = AppState::new(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    (addr, state)
}

fn write_spa(dir: &Path) {
    std::fs::write(dir.join("index.html"), "<html>relay app</html>").expect("write index");
    std::fs::create_dir_all(dir.join("assets")).expect("create assets");
    std::fs::write(dir.join("assets/app.js"), "console.log('app');").expect("write asset");
}

/// Connect to a channel and consume its `connected` frame. Returns the
/// client and the ID the server assigned.
async fn connect(addr: SocketAddr, channel: &str) -> (Client, String) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/{channel}"))
        .await
        .expect("websocket connect");
    let welcome = recv_frame(&mut ws).await;
    assert_eq!(welcome.event, "connected");
    let id = welcome
        .arg(0)
        .and_then(serde_json::Value::as_str)
        .expect("connected carries an id")
        .to_string();
    (ws, id)
}

async fn send(ws: &mut Client, event: &str, args: serde_json::Value) {
    let text = json!({ "event": event, "args": args }).to_string();
    ws.send(Message::Text(text.into())).await.expect("websocket send");
}

async fn recv_frame(ws: &mut Client) -> Frame {
    loop {
        let msg = timeout(Duration::from_millis(1000), ws.next())
            .await
            .expect("websocket receive timed out")
            .expect("websocket stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("server sent a valid frame");
        }
    }
}

/// Receive frames until one with `event` arrives, skipping others.
async fn recv_event(ws: &mut Client, event: &str) -> Frame {
    loop {
        let frame = recv_frame(ws).await;
        if frame.event == event {
            return frame;
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    let next = timeout(Duration::from_millis(150), ws.next()).await;
    assert!(next.is_err(), "expected no message, got {next:?}");
}

// =============================================================================
// HTTP
// =============================================================================

#[tokio::test]
async fn healthz_returns_ok() {
    let (addr, _state) = spawn_app(RelayConfig::default()).await;
    let resp = reqwest::get(format!("http://{addr}/healthz"))
        .await
        .expect("request");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn serves_static_assets_and_falls_back_to_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_spa(dir.path());
    let config = RelayConfig { static_dir: dir.path().to_path_buf(), ..RelayConfig::default() };
    let (addr, _state) = spawn_app(config).await;

    let root = reqwest::get(format!("http://{addr}/")).await.expect("request");
    assert_eq!(root.status(), reqwest::StatusCode::OK);
    assert_eq!(root.text().await.expect("body"), "<html>relay app</html>");

    let asset = reqwest::get(format!("http://{addr}/assets/app.js"))
        .await
        .expect("request");
    assert_eq!(asset.status(), reqwest::StatusCode::OK);
    assert_eq!(asset.text().await.expect("body"), "console.log('app');");

    let deep = reqwest::get(format!("http://{addr}/world/lobby/42"))
        .await
        .expect("request");
    assert_eq!(deep.status(), reqwest::StatusCode::OK);
    assert_eq!(deep.text().await.expect("body"), "<html>relay app</html>");
}

// =============================================================================
// WEBSOCKET: CHAT
// =============================================================================

#[tokio::test]
async fn chat_relays_to_others_but_not_sender() {
    let (addr, _state) = spawn_app(RelayConfig::default()).await;
    let (mut alice, alice_id) = connect(addr, "chat").await;
    let (mut bob, bob_id) = connect(addr, "chat").await;
    assert_ne!(alice_id, bob_id);

    send(&mut alice, "setName", json!(["Alice"])).await;
    send(&mut alice, "send-message", json!(["hello", 100])).await;

    let got = recv_frame(&mut bob).await;
    assert_eq!(got.event, "recieved-message");
    assert_eq!(got.args, vec![json!("Alice"), json!("hello"), json!(100)]);
    assert_silent(&mut alice).await;
}

// =============================================================================
// WEBSOCKET: UPDATE
// =============================================================================

#[tokio::test]
async fn update_snapshot_lists_only_ready_players_and_announces_departures() {
    let config = RelayConfig { snapshot_interval: Duration::from_millis(10), ..RelayConfig::default() };
    let (addr, state) = spawn_app(config).await;
    let snapshots = crate::services::presence::spawn_snapshot_task(state);

    let (mut alice, alice_id) = connect(addr, "update").await;
    let (mut bob, _bob_id) = connect(addr, "update").await;

    send(&mut alice, "setName", json!(["Alice"])).await;
    send(&mut alice, "setAvatar", json!(["blue"])).await;
    send(&mut bob, "setName", json!(["Bob"])).await;

    let skin = recv_event(&mut bob, "setAvatarSkin").await;
    assert_eq!(skin.args, vec![json!("blue"), json!(alice_id.clone())]);

    let data = recv_event(&mut bob, "playerData").await;
    let players = data
        .arg(0)
        .and_then(serde_json::Value::as_array)
        .expect("player list");
    assert_eq!(players.len(), 1);
    assert_eq!(players[0]["id"], json!(alice_id.clone()));
    assert_eq!(players[0]["name"], "Alice");
    assert_eq!(players[0]["position_y"], json!(-500.0));

    send(
        &mut alice,
        "updatePlayer",
        json!([{ "position": {"x": 1, "y": 2, "z": 3}, "quaternion": [1, 2, 3, 4], "animation": "walk" }]),
    )
    .await;
    let moved = loop {
        let frame = recv_event(&mut bob, "playerData").await;
        let player = frame.arg(0).and_then(|v| v.get(0)).cloned().unwrap_or_default();
        if player["animation"] == "walk" {
            break player;
        }
    };
    assert_eq!(moved["quaternion_x"], json!(1.0));
    assert_eq!(moved["quaternion_w"], json!(4.0));

    alice.close(None).await.expect("close");
    let removed = recv_event(&mut bob, "removePlayer").await;
    assert_eq!(removed.args, vec![json!(alice_id)]);

    snapshots.abort();
}

#[tokio::test]
async fn set_id_echoes_to_all_update_clients() {
    let (addr, _state) = spawn_app(RelayConfig::default()).await;
    let (mut alice, alice_id) = connect(addr, "update").await;
    let (mut bob, _bob_id) = connect(addr, "update").await;

    send(&mut alice, "setID", json!([])).await;

    for ws in [&mut alice, &mut bob] {
        let got = recv_event(ws, "setID").await;
        assert_eq!(got.args, vec![json!(alice_id.clone())]);
    }
}

#[tokio::test]
async fn channels_are_isolated() {
    let (addr, _state) = spawn_app(RelayConfig::default()).await;
    let (mut chatter, _) = connect(addr, "chat").await;
    let (mut player, _) = connect(addr, "update").await;

    send(&mut player, "setID", json!([])).await;
    recv_event(&mut player, "setID").await;

    assert_silent(&mut chatter).await;
}
