//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds one client map per channel. Each entry pairs the connection's
//! outbound frame sender with the state that connection owns. Only the
//! owning connection's handlers write its entry; the snapshot task reads.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::frame::Frame;

// =============================================================================
// GEOMETRY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Parking spot for avatars that have not reported a position yet.
    pub const OFFSCREEN: Self = Self { x: 0.0, y: -500.0, z: -500.0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl From<[f64; 4]> for Quaternion {
    fn from([x, y, z, w]: [f64; 4]) -> Self {
        Self { x, y, z, w }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

pub const DEFAULT_ANIMATION: &str = "idle";

/// Live avatar state for one "update" connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub name: String,
    pub avatar_skin: String,
    pub position: Vec3,
    pub quaternion: Quaternion,
    pub animation: String,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: String::new(),
            avatar_skin: String::new(),
            position: Vec3::OFFSCREEN,
            quaternion: Quaternion::default(),
            animation: DEFAULT_ANIMATION.to_string(),
        }
    }
}

impl Player {
    /// Visible to peers only once both name and skin are set.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.name.is_empty() && !self.avatar_skin.is_empty()
    }
}

// =============================================================================
// CONNECTED CLIENTS
// =============================================================================

/// An "update" channel connection.
pub struct PresenceClient {
    pub tx: mpsc::Sender<Frame>,
    pub player: Player,
}

impl PresenceClient {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx, player: Player::default() }
    }
}

/// A "chat" channel connection. The display name is the only state kept.
pub struct ChatClient {
    pub tx: mpsc::Sender<Frame>,
    pub name: String,
}

impl ChatClient {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx, name: String::new() }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    /// Presence registry: `client_id` -> avatar state + sender.
    pub presence: Arc<RwLock<HashMap<Uuid, PresenceClient>>>,
    /// Chat members: `client_id` -> display name + sender.
    pub chat: Arc<RwLock<HashMap<Uuid, ChatClient>>>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            presence: Arc::new(RwLock::new(HashMap::new())),
            chat: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
