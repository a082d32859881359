//! WebSocket handler — per-connection relay loop for both channels.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID, registers it with the channel's
//! service, and enters a `select!` loop:
//! - Incoming client frames → parse into a typed event → dispatch
//! - Frames queued by peers or the snapshot task → forward to client
//!
//! Handler functions mutate state and return an `Outcome`. The dispatch
//! layer owns all outbound fan-out.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register → send `connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (broadcast to all / all but sender)
//! 4. Close → channel cleanup (`removePlayer` on "update")

use std::fmt;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{self, ChatEvent, UpdateEvent};
use crate::frame::{ErrorCode, Frame};
use crate::services;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

/// Logical channel a websocket connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Chat,
    Update,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => f.write_str("chat"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send to every connection on the channel, sender included.
    Broadcast(Frame),
    /// Send to every connection on the channel except the sender.
    BroadcastExcludeSender(Frame),
    /// Nothing to send.
    Done,
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error("failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("socket closed: {0}")]
    Socket(#[from] axum::Error),
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_chat_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, Channel::Chat))
}

pub async fn handle_update_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, Channel::Update))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, channel: Channel) {
    let client_id = Uuid::new_v4();

    // Per-connection queue for frames from peers and the snapshot task.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_queue_capacity);

    match channel {
        Channel::Chat => services::chat::join(&state, client_id, client_tx).await,
        Channel::Update => services::presence::connect(&state, client_id, client_tx).await,
    }
    info!(%client_id, %channel, "ws: client connected");

    let welcome = Frame::event(events::CONNECTED).with_arg(client_id.to_string());
    match send_frame(&mut socket, &welcome).await {
        Ok(()) => relay(&mut socket, &state, channel, client_id, &mut client_rx).await,
        Err(e) => debug!(%client_id, %channel, error = %e, "ws: welcome send failed"),
    }

    leave(&state, channel, client_id).await;
    info!(%client_id, %channel, "ws: client disconnected");
}

async fn relay(
    socket: &mut WebSocket,
    state: &AppState,
    channel: Channel,
    client_id: Uuid,
    client_rx: &mut mpsc::Receiver<Frame>,
) {
    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        process_inbound_text(state, channel, client_id, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if let Err(e) = send_frame(socket, &frame).await {
                    debug!(%client_id, %channel, error = %e, "ws: outbound send failed");
                    break;
                }
            }
        }
    }
}

/// Channel cleanup. Runs once per connection, after the relay loop exits.
async fn leave(state: &AppState, channel: Channel, client_id: Uuid) {
    match channel {
        Channel::Chat => {
            services::chat::part(state, client_id).await;
        }
        Channel::Update => {
            services::presence::disconnect(state, client_id).await;
        }
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame.
///
/// Kept separate from the socket so tests can drive dispatch directly.
async fn process_inbound_text(state: &AppState, channel: Channel, client_id: Uuid, text: &str) {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, %channel, error = %e, "ws: invalid inbound frame");
            return;
        }
    };

    if req.event != events::UPDATE_PLAYER {
        debug!(%client_id, %channel, event = %req.event, "ws: recv frame");
    }

    let result = match channel {
        Channel::Chat => match ChatEvent::try_from(&req) {
            Ok(event) => Ok(handle_chat(state, client_id, event).await),
            Err(e) => Err(e),
        },
        Channel::Update => match UpdateEvent::try_from(&req) {
            Ok(event) => Ok(handle_update(state, client_id, event).await),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(Outcome::Broadcast(frame)) => broadcast(state, channel, &frame, None).await,
        Ok(Outcome::BroadcastExcludeSender(frame)) => broadcast(state, channel, &frame, Some(client_id)).await,
        Ok(Outcome::Done) => {}
        Err(e) => {
            warn!(
                %client_id,
                %channel,
                event = %req.event,
                code = e.error_code(),
                retryable = e.retryable(),
                error = %e,
                "ws: dropped inbound frame"
            );
        }
    }
}

// =============================================================================
// CHAT HANDLERS
// =============================================================================

async fn handle_chat(state: &AppState, client_id: Uuid, event: ChatEvent) -> Outcome {
    match event {
        ChatEvent::SetName(name) => {
            services::chat::set_name(state, client_id, name).await;
            Outcome::Done
        }
        ChatEvent::SendMessage { message, time } => {
            let frame = services::chat::message_frame(state, client_id, message, time).await;
            Outcome::BroadcastExcludeSender(frame)
        }
    }
}

// =============================================================================
// UPDATE HANDLERS
// =============================================================================

async fn handle_update(state: &AppState, client_id: Uuid, event: UpdateEvent) -> Outcome {
    match event {
        UpdateEvent::SetId => Outcome::Broadcast(Frame::event(events::SET_ID).with_arg(client_id.to_string())),
        UpdateEvent::SetName(name) => {
            services::presence::set_name(state, client_id, name).await;
            Outcome::Done
        }
        UpdateEvent::SetAvatar(skin) => {
            if !services::presence::set_avatar(state, client_id, skin.clone()).await {
                return Outcome::Done;
            }
            // Lets peers preload the skin before this player turns ready.
            let frame = Frame::event(events::SET_AVATAR_SKIN)
                .with_arg(skin)
                .with_arg(client_id.to_string());
            Outcome::Broadcast(frame)
        }
        UpdateEvent::InitPlayer(_) => {
            debug!(%client_id, "ws: initPlayer acknowledged");
            Outcome::Done
        }
        UpdateEvent::UpdatePlayer(update) => {
            services::presence::update_player(state, client_id, update).await;
            Outcome::Done
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn broadcast(state: &AppState, channel: Channel, frame: &Frame, exclude: Option<Uuid>) {
    match channel {
        Channel::Chat => services::chat::broadcast(state, frame, exclude).await,
        Channel::Update => services::presence::broadcast(state, frame, exclude).await,
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), SendError> {
    let json = serde_json::to_string(frame)?;
    if frame.event != events::PLAYER_DATA {
        debug!(event = %frame.event, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await?;
    Ok(())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
