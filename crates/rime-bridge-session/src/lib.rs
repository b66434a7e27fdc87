//! Session orchestration for an input-method bridge.
//!
//! Provides:
//! - `Bridge` - One engine session, driven by host commands
//! - `SessionManager` - Engine bring-up, session creation and teardown
//! - `SnapshotBuilder` - Commit + context to `Snapshot`
//! - `NotificationRouter` - Engine notifications to the host's event sink
//! - `PreferenceStore` - Host preferences applied on session creation

pub mod bridge;
pub mod config;
pub mod manager;
pub mod preferences;
pub mod router;
pub mod snapshot;

pub use bridge::{Bridge, BridgeError, BridgeState};
pub use config::BridgeConfig;
pub use manager::SessionManager;
pub use preferences::{Preference, PreferenceStore};
pub use router::NotificationRouter;
pub use snapshot::SnapshotBuilder;
