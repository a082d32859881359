//! Chat service — stateless message relay.
//!
//! DESIGN
//! ======
//! Messages are broadcast to every other chat connection and immediately
//! forgotten. No history, no delivery confirmation. The sender's display
//! name is the only per-connection state.

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::RECEIVED_MESSAGE;
use crate::frame::Frame;
use crate::state::{AppState, ChatClient};

pub async fn join(state: &AppState, client_id: Uuid, tx: mpsc::Sender<Frame>) {
    let mut chat = state.chat.write().await;
    chat.insert(client_id, ChatClient::new(tx));
    info!(%client_id, members = chat.len(), "chat: client joined");
}

/// Forget a connection. Returns `false` if it was already gone.
pub async fn part(state: &AppState, client_id: Uuid) -> bool {
    let mut chat = state.chat.write().await;
    let removed = chat.remove(&client_id).is_some();
    if removed {
        info!(%client_id, members = chat.len(), "chat: client left");
    }
    removed
}

pub async fn set_name(state: &AppState, client_id: Uuid, name: String) {
    let mut chat = state.chat.write().await;
    if let Some(client) = chat.get_mut(&client_id) {
        client.name = name;
    }
}

/// Build the `recieved-message` frame for a message from `from`.
///
/// A sender that never set a name, or already left, relays as `""`.
pub async fn message_frame(state: &AppState, from: Uuid, message: String, time: serde_json::Value) -> Frame {
    let name = state
        .chat
        .read()
        .await
        .get(&from)
        .map(|c| c.name.clone())
        .unwrap_or_default();
    Frame::with_args(RECEIVED_MESSAGE, vec![name.into(), message.into(), time])
}

/// Broadcast a frame to all chat connections, optionally excluding one.
pub async fn broadcast(state: &AppState, frame: &Frame, exclude: Option<Uuid>) {
    let chat = state.chat.read().await;
    for (client_id, client) in chat.iter() {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        if client.tx.try_send(frame.clone()).is_err() {
            debug!(%client_id, event = %frame.event, "chat: dropped frame for full or closed client");
        }
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
