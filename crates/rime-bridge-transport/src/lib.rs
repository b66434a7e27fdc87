//! Host-facing side of the bridge.
//!
//! Provides:
//! - Wire protocol (JSON commands, replies and events)
//! - `CommandHandler` to run decoded commands against a bridge
//! - WebSocket transport (feature: websocket)
//! - Terminal key mapping (feature: tui)
//! - Tracing set-up for host binaries, and engine log forwarding for bindings

pub mod handler;
pub mod logging;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "tui")]
pub mod keys;

pub use handler::CommandHandler;
pub use protocol::{HostCommand, HostReply, Outbound};
