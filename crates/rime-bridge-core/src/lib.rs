//! Core abstractions for bridging an input-method engine to a host UI.
//!
//! This crate provides the fundamental building blocks:
//! - `Engine` - The engine capability, plus scoped Commit/Context guards
//! - `Snapshot` - Command result as the host sees it
//! - `BridgeEvent` / `EventSink` - Out-of-band events and their receiver
//! - `EventStore` - Broadcast + history sink for late-attaching hosts

pub mod engine;
pub mod event;
pub mod event_store;
pub mod snapshot;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{CommitGuard, ContextGuard, Engine, EngineTraits, SessionId};
pub use event::{BridgeEvent, EventSink, NullSink};
pub use event_store::EventStore;
pub use snapshot::{Candidate, Composition, InputBuffer, Snapshot};
