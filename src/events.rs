//! Event names and typed inbound payloads for both channels.
//!
//! DESIGN
//! ======
//! Inbound frames are parsed into a closed enum per channel before any state
//! is touched. A frame that is unknown, short of arguments, or fails its
//! payload schema becomes an `EventError`; the websocket layer logs it and
//! drops the frame whole, so a connection's state never holds half an update.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::frame::{ErrorCode, Frame};
use crate::state::{Quaternion, Vec3};

// =============================================================================
// EVENT NAMES
// =============================================================================

/// Sent to a connection right after upgrade, carrying its own ID.
pub const CONNECTED: &str = "connected";

pub const SET_NAME: &str = "setName";

// chat
pub const SEND_MESSAGE: &str = "send-message";
/// Historical spelling; clients match on it verbatim.
pub const RECEIVED_MESSAGE: &str = "recieved-message";

// update
pub const SET_ID: &str = "setID";
pub const SET_AVATAR: &str = "setAvatar";
pub const SET_AVATAR_SKIN: &str = "setAvatarSkin";
pub const INIT_PLAYER: &str = "initPlayer";
pub const UPDATE_PLAYER: &str = "updatePlayer";
pub const PLAYER_DATA: &str = "playerData";
pub const REMOVE_PLAYER: &str = "removePlayer";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown event: {0}")]
    Unknown(String),
    #[error("{event}: missing argument {index}")]
    MissingArg { event: &'static str, index: usize },
    #[error("{event}: invalid payload: {source}")]
    InvalidPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ErrorCode for EventError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "E_UNKNOWN_EVENT",
            Self::MissingArg { .. } => "E_MISSING_ARG",
            Self::InvalidPayload { .. } => "E_INVALID_PAYLOAD",
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Body of `updatePlayer`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerUpdate {
    pub position: Vec3,
    /// Flat `[x, y, z, w]` on the wire.
    #[serde(deserialize_with = "quaternion_from_array")]
    pub quaternion: Quaternion,
    pub animation: String,
    #[serde(default, rename = "avatarSkin")]
    pub avatar_skin: Option<String>,
}

fn quaternion_from_array<'de, D>(deserializer: D) -> Result<Quaternion, D::Error>
where
    D: serde::Deserializer<'de>,
{
    <[f64; 4]>::deserialize(deserializer).map(Quaternion::from)
}

// =============================================================================
// CHAT EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    SetName(String),
    /// `time` is relayed untouched; `Null` when the client sent none.
    SendMessage { message: String, time: serde_json::Value },
}

impl TryFrom<&Frame> for ChatEvent {
    type Error = EventError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        match frame.event.as_str() {
            SET_NAME => Ok(Self::SetName(required_arg(frame, SET_NAME, 0)?)),
            SEND_MESSAGE => {
                let message = required_arg(frame, SEND_MESSAGE, 0)?;
                let time = frame.arg(1).cloned().unwrap_or(serde_json::Value::Null);
                Ok(Self::SendMessage { message, time })
            }
            other => Err(EventError::Unknown(other.to_string())),
        }
    }
}

// =============================================================================
// UPDATE EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    SetId,
    SetName(String),
    SetAvatar(String),
    /// Reserved extension point; the payload is accepted and ignored.
    InitPlayer(serde_json::Value),
    UpdatePlayer(PlayerUpdate),
}

impl TryFrom<&Frame> for UpdateEvent {
    type Error = EventError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        match frame.event.as_str() {
            SET_ID => Ok(Self::SetId),
            SET_NAME => Ok(Self::SetName(required_arg(frame, SET_NAME, 0)?)),
            SET_AVATAR => Ok(Self::SetAvatar(required_arg(frame, SET_AVATAR, 0)?)),
            INIT_PLAYER => Ok(Self::InitPlayer(frame.arg(0).cloned().unwrap_or(serde_json::Value::Null))),
            UPDATE_PLAYER => Ok(Self::UpdatePlayer(required_arg(frame, UPDATE_PLAYER, 0)?)),
            other => Err(EventError::Unknown(other.to_string())),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn required_arg<T: DeserializeOwned>(frame: &Frame, event: &'static str, index: usize) -> Result<T, EventError> {
    let Some(value) = frame.arg(index) else {
        return Err(EventError::MissingArg { event, index });
    };
    serde_json::from_value(value.clone()).map_err(|source| EventError::InvalidPayload { event, source })
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
