//! Domain services used by the websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own registry mutation and fan-out so route handlers can
//! stay focused on protocol translation.

pub mod chat;
pub mod presence;
