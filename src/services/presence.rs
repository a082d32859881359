//! Presence service — avatar registry and periodic snapshot broadcast.
//!
//! DESIGN
//! ======
//! Each "update" connection owns one `Player` entry in `AppState::presence`,
//! inserted on connect with default values and mutated only by that
//! connection's own events. A single background task snapshots every ready
//! player on a fixed period and fans the list out to all connections.
//! Empty snapshots are never sent.
//!
//! ERROR HANDLING
//! ==============
//! Mutations on an unknown client ID are silent no-ops: the connection may
//! have raced with its own disconnect. Removal and the `removePlayer` notice
//! share one write lock so cleanup runs exactly once per connection.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{PLAYER_DATA, PlayerUpdate, REMOVE_PLAYER};
use crate::frame::Frame;
use crate::state::{AppState, PresenceClient};

// =============================================================================
// TYPES
// =============================================================================

/// One ready player as emitted in `playerData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub quaternion_x: f64,
    pub quaternion_y: f64,
    pub quaternion_z: f64,
    pub quaternion_w: f64,
    pub animation: String,
    #[serde(rename = "avatarSkin")]
    pub avatar_skin: String,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Register a new connection with default avatar state.
pub async fn connect(state: &AppState, client_id: Uuid, tx: mpsc::Sender<Frame>) {
    let mut presence = state.presence.write().await;
    presence.insert(client_id, PresenceClient::new(tx));
    info!(%client_id, clients = presence.len(), "presence: client registered");
}

/// Remove a connection and notify everyone left.
///
/// Returns `false` if the client was already gone, in which case nothing is
/// broadcast.
pub async fn disconnect(state: &AppState, client_id: Uuid) -> bool {
    let mut presence = state.presence.write().await;
    if presence.remove(&client_id).is_none() {
        return false;
    }

    let frame = Frame::event(REMOVE_PLAYER).with_arg(client_id.to_string());
    fan_out(presence.iter(), &frame, None);
    info!(%client_id, remaining = presence.len(), "presence: client removed");
    true
}

// =============================================================================
// MUTATIONS
// =============================================================================

pub async fn set_name(state: &AppState, client_id: Uuid, name: String) {
    let mut presence = state.presence.write().await;
    if let Some(client) = presence.get_mut(&client_id) {
        client.player.name = name;
    }
}

/// Store the skin. Returns `false` if the client is unknown.
pub async fn set_avatar(state: &AppState, client_id: Uuid, skin: String) -> bool {
    let mut presence = state.presence.write().await;
    let Some(client) = presence.get_mut(&client_id) else {
        return false;
    };
    client.player.avatar_skin = skin;
    true
}

/// Overwrite position, orientation and animation. A skin in the payload
/// replaces the stored one.
pub async fn update_player(state: &AppState, client_id: Uuid, update: PlayerUpdate) {
    let mut presence = state.presence.write().await;
    let Some(client) = presence.get_mut(&client_id) else {
        return;
    };
    let player = &mut client.player;
    player.position = update.position;
    player.quaternion = update.quaternion;
    player.animation = update.animation;
    if let Some(skin) = update.avatar_skin {
        player.avatar_skin = skin;
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Run one snapshot cycle. Returns the number of players broadcast; zero
/// means nothing was sent.
///
/// The snapshot and its fan-out share one read lock, so a `removePlayer`
/// notice can never be followed by a snapshot that still lists that player.
pub async fn tick(state: &AppState) -> usize {
    let presence = state.presence.read().await;
    let players = collect_ready(&presence);
    if players.is_empty() {
        return 0;
    }

    let payload = match serde_json::to_value(&players) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "presence: failed to serialize snapshot");
            return 0;
        }
    };
    let frame = Frame::event(PLAYER_DATA).with_arg(payload);
    fan_out(presence.iter(), &frame, None);
    players.len()
}

/// Every ready player, in registry iteration order.
fn collect_ready(presence: &HashMap<Uuid, PresenceClient>) -> Vec<PlayerSnapshot> {
    presence
        .iter()
        .filter(|(_, client)| client.player.is_ready())
        .map(|(id, client)| {
            let p = &client.player;
            PlayerSnapshot {
                id: *id,
                name: p.name.clone(),
                position_x: p.position.x,
                position_y: p.position.y,
                position_z: p.position.z,
                quaternion_x: p.quaternion.x,
                quaternion_y: p.quaternion.y,
                quaternion_z: p.quaternion.z,
                quaternion_w: p.quaternion.w,
                animation: p.animation.clone(),
                avatar_skin: p.avatar_skin.clone(),
            }
        })
        .collect()
}

/// Spawn the snapshot task. Returns a handle for shutdown.
pub fn spawn_snapshot_task(state: AppState) -> JoinHandle<()> {
    let period = state.config.snapshot_interval;
    info!(interval = ?period, "presence snapshot task started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            tick(&state).await;
        }
    })
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to every "update" connection, optionally excluding one.
pub async fn broadcast(state: &AppState, frame: &Frame, exclude: Option<Uuid>) {
    let presence = state.presence.read().await;
    fan_out(presence.iter(), frame, exclude);
}

fn fan_out<'a>(clients: impl Iterator<Item = (&'a Uuid, &'a PresenceClient)>, frame: &Frame, exclude: Option<Uuid>) {
    let mut dropped = 0_usize;
    for (client_id, client) in clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        if client.tx.try_send(frame.clone()).is_err() {
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!(event = %frame.event, dropped, "presence: broadcast skipped full or closed clients");
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
