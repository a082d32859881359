//! Relay configuration parsed from environment variables.
//!
//! Every knob has a default; unparseable or zero values fall back to it so a
//! bad variable never prevents startup.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_STATIC_DIR: &str = "frontend/dist";
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 20;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    pub bind_addr: IpAddr,
    /// Directory holding the prebuilt single-page app.
    pub static_dir: PathBuf,
    /// Period of the presence snapshot broadcast.
    pub snapshot_interval: Duration,
    /// Bound of each connection's outbound frame queue.
    pub client_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            snapshot_interval: Duration::from_millis(DEFAULT_SNAPSHOT_INTERVAL_MS),
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `STATIC_DIR`: default `frontend/dist`
    /// - `SNAPSHOT_INTERVAL_MS`: default 20
    /// - `CLIENT_QUEUE_CAPACITY`: default 256
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let static_dir = lookup("STATIC_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR), PathBuf::from);

        Self {
            port: parse_nonzero(&lookup, "PORT", DEFAULT_PORT),
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR),
            static_dir,
            snapshot_interval: Duration::from_millis(parse_nonzero(
                &lookup,
                "SNAPSHOT_INTERVAL_MS",
                DEFAULT_SNAPSHOT_INTERVAL_MS,
            )),
            client_queue_capacity: parse_nonzero(&lookup, "CLIENT_QUEUE_CAPACITY", DEFAULT_CLIENT_QUEUE_CAPACITY),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match lookup(key).map(|v| v.trim().parse::<T>()) {
        Some(Ok(value)) => value,
        _ => default,
    }
}

/// Like `parse_or`, but zero also means "use the default". Zero periods and
/// zero-capacity channels panic inside tokio.
fn parse_nonzero<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Default + PartialEq + Copy,
{
    let value = parse_or(lookup, key, default);
    if value == T::default() { default } else { value }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
