//! Frame — the message envelope for both relay channels.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text message, in either direction, is one JSON Frame: an
//! event name plus positional arguments. The websocket layer routes on
//! `event` and hands `args` to the typed parsers in `crate::events`.
//!
//! DESIGN
//! ======
//! - Positional args, not a keyed map: the browser client emits
//!   `(event, arg0, arg1, ...)` and expects the same back.
//! - `ts` is stamped on construction. Inbound frames may omit it.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// =============================================================================
// TYPES
// =============================================================================

/// Positional payload. Alias to reduce noise in signatures.
pub type Args = Vec<serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub args: Args,
    /// Milliseconds since Unix epoch.
    #[serde(default = "now_ms")]
    pub ts: i64,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error logging.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a frame with no arguments.
    pub fn event(event: impl Into<String>) -> Self {
        Self { event: event.into(), args: Args::new(), ts: now_ms() }
    }

    /// Create a frame with the given positional arguments.
    pub fn with_args(event: impl Into<String>, args: Args) -> Self {
        Self { event: event.into(), args, ts: now_ms() }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    /// Append one positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

// =============================================================================
// ACCESSORS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&serde_json::Value> {
        self.args.get(index)
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
