//! Wire protocol between the host and the bridge.

use rime_bridge_core::{BridgeEvent, Snapshot};
use serde::{Deserialize, Serialize};

/// Command from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Start the engine and open a session.
    Init,
    /// Rebuild schemas and reopen the session.
    Deploy,
    /// Switch the session to another schema.
    SetSchema { schema_id: String },
    /// Toggle an engine option.
    SetOption { name: String, value: bool },
    /// Cache a preference for the next session.
    SetPreference { name: String, value: i32 },
    /// Feed a key sequence.
    ProcessKey { input: String },
    /// Commit a candidate on the current page.
    SelectCandidate { index: usize },
    /// Forget a learned candidate on the current page.
    DeleteCandidate { index: usize },
    /// Move one candidate page.
    FlipPage { backward: bool },
    /// Drop the composition.
    ClearInput,
    /// Ping for keepalive.
    Ping,
}

/// Reply to exactly one `HostCommand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostReply {
    /// Outcome of a command that produces no snapshot.
    Ok { success: bool },
    /// State after a composing command.
    Snapshot(Snapshot),
    /// The command could not be run at all.
    Error { message: String },
    /// Pong response.
    Pong,
}

/// Anything sent to the host over a push transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outbound {
    Reply(HostReply),
    Event(BridgeEvent),
}
